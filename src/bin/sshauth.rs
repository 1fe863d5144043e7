use sshauth::cli::{self, Options};

fn main() {
    match cli::run(Options::from_args()) {
        Ok(report) => print!("{}", report),
        Err(e) => {
            eprintln!("{}", e);
            ::std::process::exit(1);
        }
    }
}
