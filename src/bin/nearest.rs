use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use word2vec_cli::serializer;
use word2vec_cli::Similarity;


// batch version of the interactive lookup: prints the k most similar words for every
// token of an input file, one token per line. Ran independently from the main binary.
#[derive(Parser, Debug)]
#[command(name = "nearest", about = "Print the closest words for every token in a file")]
struct Args {
    /// Saved model, an archive file or a text model directory
    model: PathBuf,
    /// File with one token per line
    input: PathBuf,
    /// Number of neighbours per token
    #[arg(short, long, default_value_t = 10)]
    k: usize,
}

fn main() -> anyhow::Result<()> {

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let compressed = !args.model.is_dir();
    let model = serializer::read_model(&args.model, compressed)
        .with_context(|| format!("cannot load model {}", args.model.display()))?;
    let sim_obj = Similarity::new(&model);

    let f = File::open(&args.input).with_context(|| format!("cannot open {}", args.input.display()))?;
    let mut tokens = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        let token = line.trim();
        if !token.is_empty() {
            tokens.push(token.to_string());
        }
    }

    run_similarity(&tokens, args.k, &sim_obj, &mut io::stdout().lock())
}

fn run_similarity<W: Write>(inputs: &[String], k: usize, similarity_object: &Similarity, out: &mut W) -> anyhow::Result<()> {

    // finding the k most similar words to each of the input tokens
    for token in inputs {

        writeln!(out, "searching {} most similar words to {}", k, token)?;
        if let Err(e) = similarity_object.extract_vec_from_word(token) {
            writeln!(out, "{}\n", e)?;
            continue;
        }
        let similarities = similarity_object.words_nearest(token, k);
        for (i, (similar_token, score)) in similarities.iter().enumerate() {
            writeln!(out, "{} : {} ? {} = {}", i, token, similar_token, score)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
