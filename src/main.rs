use rsh::Shell;
use std::process;

fn main() {
    env_logger::init();
    let mut shell = Shell::new();
    let code = shell.run();
    process::exit(code);
}
