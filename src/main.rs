use std::env;
use std::io;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;
use word2vec_cli::{NativeBackend, Run};

fn main() {

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let work_dir = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("cannot resolve working directory: {}", e);
            process::exit(1);
        }
    };

    let run = Run::from_work_dir(&work_dir, NativeBackend);
    let stdin = io::stdin();
    match run.run(env::args_os(), stdin.lock(), io::stdout()) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}
