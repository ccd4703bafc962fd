use std::process;

fn main() {
    match codefence_cli::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("codefence error: {err}");
            process::exit(codefence_cli::exit_code_for(&err));
        }
    }
}
