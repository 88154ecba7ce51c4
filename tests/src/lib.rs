//! End-to-end runs of the scheduler against in-process engines, plus the
//! interface selection checks that need hand-made network interfaces.

pub mod fakes;

#[cfg(test)]
mod net;
#[cfg(test)]
mod workflow;
