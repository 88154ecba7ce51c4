mod interface;
mod util;
