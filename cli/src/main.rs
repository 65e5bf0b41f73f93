//! Binary entrypoint for fontshelf-cli (made by FontLab https://www.fontlab.com/)

fn main() {
    match fontshelf_cli::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
