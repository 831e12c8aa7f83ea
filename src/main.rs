use std::process::ExitCode;

fn main() -> ExitCode {
    gigs_importer::run()
}
