use colored::*;

use crate::terminal::print;

const BANNER_0: &str = r#"
     ██▀███  ▓█████  ▄████▄   ▒█████   ███▄    █  ██▀███
    ▓██ ▒ ██▒▓█   ▀ ▒██▀ ▀█  ▒██▒  ██▒ ██ ▀█   █ ▓██ ▒ ██▒
    ▓██ ░▄█ ▒▒███   ▒▓█    ▄ ▒██░  ██▒▓██  ▀█ ██▒▓██ ░▄█ ▒
    ▒██▀▀█▄  ▒▓█  ▄ ▒▓▓▄ ▄██▒▒██   ██░▓██▒  ▐▌██▒▒██▀▀█▄
    ░██▓ ▒██▒░▒████▒▒ ▓███▀ ░░ ████▓▒░▒██░   ▓██░░██▓ ▒██▒
    ░ ▒▓ ░▒▓░░░ ▒░ ░░ ░▒ ▒  ░░ ▒░▒░▒░ ░ ▒░   ▒ ▒ ░ ▒▓ ░▒▓░
      ░▒ ░ ▒░ ░ ░  ░  ░  ▒     ░ ▒ ▒░ ░ ░░   ░ ▒░  ░▒ ░ ▒░
      ░░   ░    ░   ░        ░ ░ ░ ▒     ░   ░ ░   ░░   ░
       ░        ░  ░░ ░          ░ ░           ░    ░
"#;

const BANNER_1: &str = r#"
      ____  _____ ____ ___  _   _ ____
     |  _ \| ____/ ___/ _ \| \ | |  _ \
     | |_) |  _|| |  | | | |  \| | |_) |
     |  _ <| |__| |__| |_| | |\  |  _ <
     |_| \_\_____\____\___/|_| \_|_| \_\
"#;

const BANNER_2: &str = r#"
          ___       ___       ___       ___       ___       ___
         /\  \     /\  \     /\  \     /\  \     /\__\     /\  \
        /::\  \   /::\  \   /::\  \   /::\  \   /:| _|_   /::\  \
       /::\:\__\ /::\:\__\ /:/\:\__\ /:/\:\__\ /::|/\__\ /::\:\__\
       \;:::/  / \:\:\/  / \:\ \/__/ \:\/:/  / \/|::/  / \;:::/  /
        |:\/__/   \:\/  /   \:\__\    \::/  /    |:/  /   |:\/__/
         \|__|     \/__/     \/__/     \/__/     \/__/     \|__|
"#;

const BANNER_3: &str = r#"
     .-------.     .-''-.     _______       ,-----.    ,---.   .--..-------.
     |  _ _   \  .'_ _   \   /   __  \    .'  .-,  '.  |    \  |  ||  _ _   \
     | ( ' )  | / ( ` )   ' | ,_/  \__)  / ,-.|  \ _ \ |  ,  \ |  || ( ' )  |
     |(_ o _) /. (_ o _)  |,-./  )      ;  \  '_ /  | :|  |\_ \|  ||(_ o _) /
     | (_,_).' |  (_,_)___|\  '_ '`)    |  _`,/ \ _/  ||  _( )_\  || (_,_).'
     |  |\ \  |'  \   .---. > (_)  )  __: (  '\_/ \   ;| (_ o _)  ||  |\ \  |
     |  | \ `'  \  `-'    /(  .  .-'_/  )\ `"/  \  ) / |  (_,_)\  ||  | \ `'
     |  |  \    / \       /  `-'`-'     /  '. \_/``".'  |  |    |  ||  |  \    /
     ''-'   `'-'   `'-..-'     `._____.'     '-----'    '--'    '--'''-'   `'-'
"#;

const BANNER_4: &str = r#"
     ▄▄▄▄▄▄▄▄  ▄▄▄▄▄▄▄▄  ▄▄▄▄▄▄▄▄  ▄▄▄▄▄▄▄▄  ▄▄▄   ▄▄  ▄▄▄▄▄▄▄▄
     ██    ██  ██        ██        ██    ██  ████  ██  ██    ██
     ████████  ██████    ██        ██    ██  ██ ██ ██  ████████
     ██  ██    ██        ██        ██    ██  ██  ████  ██  ██
     ██   ███  ████████  ████████  ████████  ██   ███  ██   ███
"#;

/// Prints one of the banners, picked at random.
pub fn print() {
    let art = match rand::random_range(0..=4u8) {
        0 => BANNER_0.red(),
        1 => BANNER_1.truecolor(255, 165, 0),
        2 => BANNER_2.green(),
        3 => BANNER_3.blue(),
        _ => BANNER_4.truecolor(80, 80, 100),
    };
    print::print(&art.to_string());
}
