use std::fmt::Write as _;
use std::path::Path;

use aw_engine::{PipelineConfig, SearchDriver, TrainedArtifact, ENCODERS_FILE, REPORT_FILE};
use aw_model::FoldStrategy;
use tempfile::tempdir;

const HEADER: &str = "Timestamp,From Bank,Account,To Bank,Account,Amount Received,\
Receiving Currency,Amount Paid,Payment Currency,Payment Format,Is Laundering";

const FORMATS: [&str; 4] = ["Cheque", "ACH", "Credit Card", "Cash"];

fn transaction(i: usize) -> (Vec<String>, bool) {
    let laundering = i % 5 == 0;
    let amount = if laundering {
        50_000.0 + (i * 37 % 1000) as f64
    } else {
        100.0 + (i * 13 % 500) as f64
    };
    let row = vec![
        format!("2022/09/01 {:02}:{:02}", i % 24, i % 60),
        format!("{}", 10 + i % 7),
        format!("80{:04X}", i % 13),
        format!("{}", 20 + i % 5),
        format!("81{:04X}", i % 17),
        format!("{amount:.2}"),
        if i % 2 == 0 { "US Dollar" } else { "Euro" }.to_string(),
        format!("{amount:.2}"),
        if i % 3 == 0 { "US Dollar" } else { "Euro" }.to_string(),
        if laundering { "Wire" } else { FORMATS[i % FORMATS.len()] }.to_string(),
        if laundering { "1" } else { "0" }.to_string(),
    ];
    (row, laundering)
}

fn write_csv(path: &Path, rows: usize) {
    let mut text = String::from(HEADER);
    text.push('\n');
    for i in 0..rows {
        let (row, _) = transaction(i);
        writeln!(text, "{}", row.join(",")).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn config(data: &Path, output: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.data_path = data.to_path_buf();
    config.output_dir = output.to_path_buf();
    config.search.pack_size = 4;
    config.search.max_iterations = 3;
    config.booster.n_estimators = 15;
    config.folds = FoldStrategy::KFold { k: 3 };
    config
}

#[test]
fn search_exports_a_loadable_artifact() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("transactions.csv");
    let output = dir.path().join("models");
    write_csv(&data, 300);

    let artifact = SearchDriver::new(config(&data, &output)).unwrap().run().unwrap();
    assert!(output.join(ENCODERS_FILE).exists());
    assert!(output.join(REPORT_FILE).exists());

    let loaded = TrainedArtifact::load(&output).unwrap();
    assert_eq!(loaded.feature_columns, artifact.feature_columns);
    assert_eq!(loaded.feature_columns.len(), 10);
    assert_eq!(loaded.feature_columns[4], "Account.1");

    let report = loaded.report.as_ref().unwrap();
    assert_eq!(report.history.len(), 3);
    assert!(report.best_fitness > 0.9, "best fitness {}", report.best_fitness);
    let holdout = report.holdout.as_ref().unwrap();
    assert!(holdout.average_precision > 0.9, "{holdout:?}");
    let monotone = report.history.best_curve();
    assert!(monotone.windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn exported_artifact_scores_raw_transactions() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("transactions.csv");
    let output = dir.path().join("models");
    write_csv(&data, 300);
    SearchDriver::new(config(&data, &output)).unwrap().run().unwrap();

    let artifact = TrainedArtifact::load(&output).unwrap();
    let encoders = artifact.encoders.as_ref().unwrap();
    let score = |i: usize| {
        let (row, _) = transaction(i);
        let features: Vec<f64> = encoders
            .columns
            .iter()
            .zip(&row)
            .map(|(encoder, cell)| encoder.encode_lenient(cell).unwrap())
            .collect();
        artifact.score_features(&features).unwrap()
    };

    let laundering = score(1000);
    let normal = score(1001);
    assert!(laundering > 0.5, "laundering scored {laundering}");
    assert!(normal < 0.5, "normal scored {normal}");
}

#[test]
fn identical_runs_pick_the_same_configuration() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("transactions.csv");
    write_csv(&data, 200);

    let a = SearchDriver::new(config(&data, &dir.path().join("a"))).unwrap().run().unwrap();
    let b = SearchDriver::new(config(&data, &dir.path().join("b"))).unwrap().run().unwrap();
    let (a, b) = (a.report.unwrap(), b.report.unwrap());
    assert_eq!(a.best_config, b.best_config);
    assert_eq!(a.best_fitness, b.best_fitness);
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn missing_data_file_fails_cleanly() {
    let dir = tempdir().unwrap();
    let err = SearchDriver::new(config(&dir.path().join("absent.csv"), dir.path()))
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, aw_types::AwError::Data(_)), "{err}");
}
