use anyhow::Context;
use clap::{error::ErrorKind, Parser, Subcommand};
use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::backend::EmbeddingBackend;
use crate::config::{read_stop_words, Properties, VectorsConfiguration};
use crate::corpus::{FileSentenceIterator, LowerCasePreProcessor, SentenceIterator};
use crate::model::Word2Vec;
use crate::query::QueryLoop;
use crate::serializer;

const PROGRAM: &str = "word2vec";
const TRAIN_USAGE: &str = "train file/directory targetmodelfile/folder";
const LOAD_USAGE: &str = "load sourcezipfile";
const RETRAIN_USAGE: &str = "retrain sourcezipfile file/directory targetmodelfile/folder";


#[derive(Parser, Debug)]
#[command(name = PROGRAM, about = "Train, load and retrain word2vec models", disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

// paths are collected loosely so a short argument list prints usage instead of a clap error
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train a new model: <file/directory> <target model file/folder>
    Train { paths: Vec<PathBuf> },
    /// Load a saved model: <source model file/folder>
    Load { paths: Vec<PathBuf> },
    /// Continue training a saved model: <source model> <file/directory> <target model file/folder>
    Retrain { paths: Vec<PathBuf> },
}


/// Command dispatcher. Configuration is read once and shared by every operation.
pub struct Run<B: EmbeddingBackend> {
    properties: Properties,
    work_dir: PathBuf,
    backend: B,
}

impl<B: EmbeddingBackend> Run<B> {

    pub fn new(properties: Properties, work_dir: &Path, backend: B) -> Run<B> {
        debug!("{}", properties);
        Self { properties, work_dir: work_dir.to_path_buf(), backend }
    }

    /// Reads `config.properties` from `work_dir` (or the bundled default).
    pub fn from_work_dir(work_dir: &Path, backend: B) -> Run<B> {
        Run::new(Properties::load(work_dir), work_dir, backend)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.work_dir.join(path) }
    }

    /// Parses `args` (program name first), runs the requested operation and then the
    /// interactive lookup. Usage problems are not errors: usage is printed and 0 returned.
    pub fn run<I, T, R, W>(&self, args: I, input: R, mut output: W) -> anyhow::Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        R: BufRead,
        W: Write {

        let cli = match Cli::try_parse_from(args) {
            Ok(cli) => cli,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                write!(output, "{}", e.render())?;
                return Ok(0);
            },
            Err(e) => {
                debug!("could not parse arguments: {:?}", e.kind());
                usage(&mut output)?;
                return Ok(0);
            }
        };

        let model = match cli.command {
            Some(Command::Train { paths }) if paths.len() >= 2 => self.train(&paths[0], &paths[1])?,
            Some(Command::Load { paths }) if !paths.is_empty() => self.load(&paths[0])?,
            Some(Command::Retrain { paths }) if paths.len() >= 3 => self.retrain(&paths[0], &paths[1], &paths[2])?,
            Some(Command::Train { .. }) => return command_usage(&mut output, TRAIN_USAGE),
            Some(Command::Load { .. }) => return command_usage(&mut output, LOAD_USAGE),
            Some(Command::Retrain { .. }) => return command_usage(&mut output, RETRAIN_USAGE),
            None => {
                usage(&mut output)?;
                return Ok(0);
            }
        };

        QueryLoop::new(&self.backend, &model, input, &mut output).run()?;
        Ok(0)
    }

    /// Builds and fits a new model on `source`, then saves it to `target`.
    pub fn train(&self, source: &Path, target: &Path) -> anyhow::Result<Word2Vec> {

        let mut iter = FileSentenceIterator::new(source)
            .with_context(|| format!("cannot read corpus {}", source.display()))?;
        if self.properties.preprocessor {
            iter.set_pre_processor(Box::new(LowerCasePreProcessor));
        }

        let stop_words = match &self.properties.stop_word_file {
            Some(path) => {
                let path = self.resolve(path);
                Some(read_stop_words(&path).with_context(|| format!("cannot read stop words {}", path.display()))?)
            },
            None => None
        };

        let mut configuration = match VectorsConfiguration::from_work_dir(&self.work_dir)
            .with_context(|| format!("cannot read builder configuration in {}", self.work_dir.display()))? {
            Some(configuration) => {
                info!("using builder configuration from {}", self.work_dir.display());
                configuration
            },
            None => self.properties.to_vectors_configuration()
        };
        configuration.elements_learning_algorithm = self.properties.algorithm;
        if let Some(stop_words) = stop_words {
            configuration.stop_list = stop_words;
        }

        debug!("=====Starting Building Vocab and Training=====");
        let timer = Instant::now();
        let mut model = self.backend.build(&configuration);
        self.backend.fit(&mut model, &mut iter)
            .with_context(|| format!("training on {} failed", source.display()))?;
        info!("vocabulary size {}, documents {}, total words {}, took {} seconds...",
            model.vocab.num_words(), model.vocab.total_number_of_docs(),
            model.vocab.total_word_occurrences(), timer.elapsed().as_secs());

        self.save(&model, target)?;
        Ok(model)
    }

    /// Restores a saved model without training.
    pub fn load(&self, source: &Path) -> anyhow::Result<Word2Vec> {
        let model = serializer::read_model(source, self.properties.model_compressed)
            .with_context(|| format!("cannot load model {}", source.display()))?;
        info!("loaded {} words of dimension {}", model.vocab.num_words(), model.lookup_table.layer_size());
        Ok(model)
    }

    /// Loads `archive`, continues training on `corpus` and saves the result to `target`.
    pub fn retrain(&self, archive: &Path, corpus: &Path, target: &Path) -> anyhow::Result<Word2Vec> {

        let mut model = self.load(archive)?;
        info!("stop words: {:?}", model.stop_words());

        let mut iter = FileSentenceIterator::new(corpus)
            .with_context(|| format!("cannot read corpus {}", corpus.display()))?;
        iter.set_pre_processor(Box::new(LowerCasePreProcessor));

        model.set_elements_learning_algorithm(self.properties.algorithm);
        model.configuration.window = self.properties.window;

        debug!("=====Starting Retraining=====");
        self.backend.fit(&mut model, &mut iter)
            .with_context(|| format!("retraining on {} failed", corpus.display()))?;

        self.save(&model, target)?;
        Ok(model)
    }

    fn save(&self, model: &Word2Vec, target: &Path) -> anyhow::Result<()> {
        serializer::write_model(model, target, self.properties.model_compressed)
            .with_context(|| format!("cannot save model to {}", target.display()))
    }
}


pub fn usage<W: Write>(output: &mut W) -> std::io::Result<()> {
    writeln!(output, "Usage: {} ACTION", PROGRAM)?;
    writeln!(output, "where ACTION is one of:")?;
    for line in [TRAIN_USAGE, LOAD_USAGE, RETRAIN_USAGE] {
        writeln!(output, "\t{}", line)?;
    }
    Ok(())
}

fn command_usage<W: Write>(output: &mut W, line: &str) -> anyhow::Result<i32> {
    writeln!(output, "Usage: {} {}", PROGRAM, line)?;
    Ok(0)
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::backend::NativeBackend;
    use crate::config::Algorithm;
    use crate::memory::tests::STATE_LOCK;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    const CORPUS: &str = "Cats chase mice and cats sleep\nDogs chase cats and dogs bark\nMice fear cats and dogs\n";

    fn properties(compressed: bool) -> Properties {
        Properties {
            dimension: 10,
            window: 3,
            min_word_frequency: 1,
            model_compressed: compressed,
            ..Default::default()
        }
    }

    fn workspace() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, CORPUS).unwrap();
        (dir, corpus)
    }

    fn invoke(run: &Run<NativeBackend>, args: &[&str], input: &str) -> (i32, String) {
        let mut output = Vec::new();
        let mut argv = vec![PROGRAM];
        argv.extend_from_slice(args);
        let code = run.run(argv, Cursor::new(input.to_string()), &mut output).unwrap();
        (code, String::from_utf8(output).unwrap())
    }

    #[test]
    fn no_arguments_prints_usage() {
        let (dir, _) = workspace();
        let run = Run::new(properties(true), dir.path(), NativeBackend);
        let (code, output) = invoke(&run, &[], "");
        assert_eq!(code, 0);
        assert!(output.starts_with("Usage: word2vec ACTION"));
        assert!(output.contains(RETRAIN_USAGE));
        assert!(output.contains("\ttrain file/directory targetmodelfile/folder\n"));
        assert!(output.contains("\tload sourcezipfile\n"));
        assert!(!output.contains('"'));

        let (code, output) = invoke(&run, &["evaluate", "x"], "");
        assert_eq!(code, 0);
        assert!(output.contains("where ACTION is one of:"));
    }

    #[test]
    fn short_train_prints_usage_and_writes_nothing() {
        let (dir, corpus) = workspace();
        let run = Run::new(properties(true), dir.path(), NativeBackend);
        let (code, output) = invoke(&run, &["train", corpus.to_str().unwrap()], "");
        assert_eq!(code, 0);
        assert_eq!(output.trim_end(), format!("Usage: word2vec {}", TRAIN_USAGE));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        let (code, output) = invoke(&run, &["retrain", "a", "b"], "");
        assert_eq!(code, 0);
        assert!(output.contains(RETRAIN_USAGE));
    }

    #[test]
    fn train_then_load_archive() {
        let (dir, corpus) = workspace();
        let target = dir.path().join("model.zip");
        let run = Run::new(properties(true), dir.path(), NativeBackend);

        let (code, output) = invoke(&run, &["train", corpus.to_str().unwrap(), target.to_str().unwrap(), "ignored"], "y\ncats\n2\nq\n");
        assert_eq!(code, 0);
        assert!(target.is_file());
        assert!(output.contains("Frequency of cats is 4"));
        assert!(output.contains("closest 2 words for cats are ["));

        let loaded = run.load(&target).unwrap();
        assert_eq!(loaded.vocab.word_frequency("cats"), 4);
        assert_eq!(loaded.lookup_table.layer_size(), 10);
    }

    #[test]
    fn train_then_load_directory() {
        let _lock = STATE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let (dir, corpus) = workspace();
        let target = dir.path().join("model");
        let run = Run::new(properties(false), dir.path(), NativeBackend);

        let trained = run.train(&corpus, &target).unwrap();
        assert!(target.join("syn0.txt").is_file());

        let (code, _) = invoke(&run, &["load", target.to_str().unwrap()], "n\n");
        assert_eq!(code, 0);
        let loaded = run.load(&target).unwrap();
        assert_eq!(loaded.lookup_table.syn0, trained.lookup_table.syn0);
        assert_eq!(loaded.vocab.doc_appeared_in("dogs"), trained.vocab.doc_appeared_in("dogs"));
    }

    #[test]
    fn retrain_continues_from_saved_model() {
        let (dir, corpus) = workspace();
        let first = dir.path().join("first.zip");
        let second = dir.path().join("second.zip");

        let trained = Run::new(properties(true), dir.path(), NativeBackend).train(&corpus, &first).unwrap();

        let mut props = properties(true);
        props.window = 2;
        props.algorithm = Algorithm::Cbow;
        let run = Run::new(props, dir.path(), NativeBackend);
        let extra = dir.path().join("extra.txt");
        fs::write(&extra, "cats and dogs chase unicorns\n").unwrap();

        let (code, _) = invoke(&run, &["retrain", first.to_str().unwrap(), extra.to_str().unwrap(), second.to_str().unwrap()], "");
        assert_eq!(code, 0);

        let retrained = run.load(&second).unwrap();
        assert_eq!(retrained.vocab.num_words(), trained.vocab.num_words());
        assert!(!retrained.vocab.contains_word("unicorns"));
        assert_eq!(retrained.configuration.window, 2);
        assert_eq!(retrained.algorithm(), Algorithm::Cbow);
        assert_ne!(retrained.lookup_table.syn0, trained.lookup_table.syn0);
    }

    #[test]
    fn builder_configuration_overrides_properties() {
        let (dir, corpus) = workspace();
        fs::write(dir.path().join("config.json"), r#"{"layersSize": 7, "minWordFrequency": 2}"#).unwrap();
        let run = Run::new(properties(true), dir.path(), NativeBackend);

        let model = run.train(&corpus, &dir.path().join("model.zip")).unwrap();
        assert_eq!(model.lookup_table.layer_size(), 7);
        assert!(!model.vocab.contains_word("sleep"));
        assert!(model.vocab.contains_word("cats"));
    }

    #[test]
    fn stop_words_are_applied() {
        let (dir, corpus) = workspace();
        fs::write(dir.path().join("stop.txt"), "and, chase\n").unwrap();
        let mut props = properties(true);
        props.stop_word_file = Some(PathBuf::from("stop.txt"));
        let run = Run::new(props, dir.path(), NativeBackend);

        let model = run.train(&corpus, &dir.path().join("model.zip")).unwrap();
        assert_eq!(model.stop_words(), ["and", "chase"]);
        assert!(!model.vocab.contains_word("and"));
        assert!(!model.vocab.contains_word("chase"));
    }

    #[test]
    fn missing_model_is_an_error() {
        let (dir, _) = workspace();
        let run = Run::new(properties(true), dir.path(), NativeBackend);
        let mut output = Vec::new();
        let missing = dir.path().join("missing.zip");
        let result = run.run([PROGRAM, "load", missing.to_str().unwrap()], Cursor::new(String::new()), &mut output);
        assert!(result.is_err());
    }
}
