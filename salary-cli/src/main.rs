//! Linha de comando: extrai tabelas de remuneração de textos anuais e anota
//! o gênero previsto de cada pessoa.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use salary_core::{
    dataset,
    document::{year_from_name, DocumentTextExtractor, PlainTextExtractor},
    frequency,
    pipeline::{BatchExtraction, Inference, PipelineEvent, RawDocument, SalaryPipeline},
    InferenceContext, PipelineConfig,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "salary", version)]
#[command(about = "Extrai remunerações de relatórios anuais e infere gênero pelo primeiro nome")]
struct Cli {
    /// Arquivo JSON de configuração (ausente = padrões)
    #[arg(long, global = true, env = "SALARY_CONFIG")]
    config: Option<PathBuf>,

    /// Log em nível debug
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extrai `<ano>.csv` e `all_years.csv` de arquivos `*.txt`
    Extract {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Treina o classificador estatístico e salva em JSON
    Train {
        #[arg(long)]
        model: PathBuf,
        /// Quantas features informativas listar
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Anota um CSV de registros com o gênero previsto
    Infer {
        #[arg(long)]
        records: PathBuf,
        /// Modelo já treinado; sem ele o modelo é treinado na hora
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Extração seguida de inferência
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = PipelineConfig::load_or_default(cli.config.as_deref())
        .context("falha ao ler a configuração")?;
    let pipeline = SalaryPipeline::new(config);

    match cli.command {
        Command::Extract { input, output } => extract(&pipeline, &input, &output),
        Command::Train { model, top } => train(&pipeline, &model, top),
        Command::Infer {
            records,
            model,
            output,
        } => infer(&pipeline, &records, model.as_deref(), &output),
        Command::Run { input, output } => run(&pipeline, &input, &output),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

/// Lê os `*.txt` de um diretório cujo nome indica o ano.
fn read_documents(dir: &Path) -> Result<Vec<RawDocument>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("falha ao listar {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();

    let extractor = PlainTextExtractor;
    let mut documents = Vec::new();
    for path in paths {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let Some(year) = year_from_name(name) else {
            warn!(file = %path.display(), "arquivo sem ano no nome, ignorado");
            continue;
        };
        let bytes = fs::read(&path).with_context(|| format!("falha ao ler {}", path.display()))?;
        let text = extractor
            .extract(&bytes)
            .with_context(|| format!("falha ao decodificar {}", path.display()))?;
        debug!(file = %path.display(), year = %year, bytes = bytes.len(), "documento lido");
        documents.push(RawDocument { year, text });
    }

    if documents.is_empty() {
        bail!("nenhum documento com ano no nome em {}", dir.display());
    }
    Ok(documents)
}

fn write_extraction(output: &Path, batch: &BatchExtraction) -> Result<()> {
    fs::create_dir_all(output).with_context(|| format!("falha ao criar {}", output.display()))?;
    for (year, records) in batch.records_by_year() {
        dataset::write_records(&output.join(format!("{year}.csv")), &records)?;
    }
    dataset::write_records(&output.join("all_years.csv"), &batch.records())?;
    Ok(())
}

fn write_inference(output: &Path, inference: &Inference) -> Result<()> {
    fs::create_dir_all(output).with_context(|| format!("falha ao criar {}", output.display()))?;
    dataset::write_predictions(&output.join("lookup_predictions.csv"), &inference.lookup_predictions())?;
    dataset::write_predictions(&output.join("model_predictions.csv"), &inference.model_predictions())?;
    dataset::write_predictions(&output.join("all_predictions.csv"), &inference.annotated)?;
    if let Some(accuracy) = inference.model_accuracy {
        dataset::write_text(&output.join("model_accuracy.txt"), &accuracy.to_string())?;
    }
    Ok(())
}

fn extract(pipeline: &SalaryPipeline, input: &Path, output: &Path) -> Result<()> {
    let documents = read_documents(input)?;
    let batch = pipeline.extract_all(&documents);

    for err in &batch.errors {
        warn!(error = %err, "falha de extração");
    }
    if batch.years.is_empty() {
        bail!("nenhum ano produziu registros ({} falhas)", batch.errors.len());
    }

    write_extraction(output, &batch)?;
    info!(
        years = batch.years.len(),
        records = batch.records().len(),
        report = %batch.report,
        "extração gravada em {}",
        output.display()
    );
    Ok(())
}

fn build_table(pipeline: &SalaryPipeline) -> Result<frequency::FrequencyTable> {
    let sources = dataset::read_sources(&pipeline.config.sources)
        .context("falha ao ler as bases de nomes")?;
    let (table, report) = frequency::build(&sources)?;
    debug!(?report, "relatório da tabela");
    Ok(table)
}

fn train(pipeline: &SalaryPipeline, model_path: &Path, top: usize) -> Result<()> {
    let table = build_table(pipeline)?;
    let context = InferenceContext::train(table, &pipeline.config)?;
    let Some(model) = context.model.as_deref() else {
        bail!("modelo não treinado");
    };

    dataset::write_model(model_path, model)?;
    info!(accuracy = model.accuracy(), "modelo gravado em {}", model_path.display());
    for feature in model.most_informative_features(top) {
        info!(
            feature = %feature.feature,
            value = %feature.value,
            favours = %feature.favours,
            ratio = feature.ratio,
            "feature informativa"
        );
    }
    Ok(())
}

fn infer(
    pipeline: &SalaryPipeline,
    records_path: &Path,
    model_path: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let records = dataset::read_records(records_path)
        .with_context(|| format!("falha ao ler {}", records_path.display()))?;
    let table = build_table(pipeline)?;

    let context = match model_path {
        Some(path) => {
            let model = dataset::read_model(path)
                .with_context(|| format!("falha ao ler o modelo {}", path.display()))?;
            InferenceContext::with_model(table, Some(model), &pipeline.config)
        }
        None => InferenceContext::train(table, &pipeline.config)?,
    };

    let inference = pipeline.infer(&records, &context);
    write_inference(output, &inference)?;
    info!(records = inference.annotated.len(), report = %inference.report, "previsões gravadas em {}", output.display());
    Ok(())
}

/// Espera a thread de log dos eventos; `false` se ela terminou em pânico.
fn join_logger(handle: thread::JoinHandle<()>) -> bool {
    let joined = handle.join().is_ok();
    if !joined {
        warn!("thread de log dos eventos terminou em pânico");
    }
    joined
}

fn run(pipeline: &SalaryPipeline, input: &Path, output: &Path) -> Result<()> {
    let documents = read_documents(input)?;
    let sources = dataset::read_sources(&pipeline.config.sources)
        .context("falha ao ler as bases de nomes")?;

    let (tx, rx) = mpsc::channel::<PipelineEvent>();
    let logger = thread::spawn(move || {
        for event in rx {
            match event {
                PipelineEvent::YearFailed { year, message } => warn!(%year, %message, "ano com falha"),
                PipelineEvent::Error { message } => warn!(%message, "erro no pipeline"),
                other => debug!(event = ?other, "evento"),
            }
        }
    });

    let result = pipeline.run_streaming(&documents, &sources, tx);
    join_logger(logger);
    let out = result?;

    write_extraction(output, &out.extraction)?;
    write_inference(output, &out.inference)?;
    info!(report = %out.report, "execução gravada em {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(year: &str, body: &str) -> RawDocument {
        RawDocument {
            year: year.to_string(),
            text: format!("external cost recoveries. {body} Earnings greater than"),
        }
    }

    #[test]
    fn test_same_year_documents_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SalaryPipeline::new(PipelineConfig::default());
        let batch = pipeline.extract_all(&[
            doc("2023", "Smith, Jane 85,000 1,200"),
            doc("2023", "Lee, Bo 60,000 500 Kim, Al 1 2"),
            doc("2022", "Ng, Cy 10 20"),
        ]);
        write_extraction(dir.path(), &batch).unwrap();

        let y2023 = dataset::read_records(&dir.path().join("2023.csv")).unwrap();
        assert_eq!(y2023.len(), 3);
        let y2022 = dataset::read_records(&dir.path().join("2022.csv")).unwrap();
        assert_eq!(y2022.len(), 1);
        let all = dataset::read_records(&dir.path().join("all_years.csv")).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_join_logger_reports_panic() {
        let ok = thread::spawn(|| {});
        assert!(join_logger(ok));

        let failed = thread::spawn(|| panic!("falha simulada no consumidor de eventos"));
        assert!(!join_logger(failed));
    }
}
