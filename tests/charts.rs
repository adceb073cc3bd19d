//! Charts rendered from files laid out the way training runs leave them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use lesion_balance::dataset::GroundTruth;
use lesion_balance::plot::{
    ComparisonOptions, ComplexityOptions, HyperparameterComparisonOptions, SweepOptions,
    complexity_graph, hyperparameter_comparison, hyperparameter_over_epochs, model_comparison,
};
use lesion_balance::results::{ModelRegistry, ScoreKind, TrainingLog};

const GROUND_TRUTH: &str = "image,MEL,NV,BCC\nimg0,1,0,0\nimg1,1,0,0\nimg2,0,1,0\nimg3,0,1,0\nimg4,0,0,1\n";

fn write_run(root: &Path, name: &str, best: f64, predictions: &[usize]) {
    let run = root.join(name);
    fs::create_dir_all(run.join("pred/no_unknown")).unwrap();

    let mut log = String::from(
        "epoch,loss,val_loss,accuracy,val_accuracy,balanced_accuracy,val_balanced_accuracy,lr\n",
    );
    for epoch in 0..5 {
        let t = f64::from(epoch) / 4.0;
        log.push_str(&format!(
            "{epoch},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},0.001\n",
            1.5 - t,
            1.6 - t,
            0.4 + t * (best - 0.4),
            0.3 + t * (best - 0.35),
            0.35 + t * (best - 0.35),
            0.3 + t * (best - 0.4),
        ));
    }
    fs::write(run.join("log.csv"), log).unwrap();

    let mut csv = String::from("image,pred_category\n");
    for (i, p) in predictions.iter().enumerate() {
        csv.push_str(&format!("img{i},{p}\n"));
    }
    for stem in ["best_balanced_acc", "best_loss", "latest"] {
        fs::write(run.join(format!("pred/no_unknown/{stem}.csv")), &csv).unwrap();
    }
}

fn workspace() -> (tempfile::TempDir, ModelRegistry, GroundTruth) {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), "dn_lr3", 0.9, &[0, 0, 1, 1, 2]);
    write_run(dir.path(), "dn_lr2", 0.7, &[0, 1, 1, 1, 2]);
    write_run(dir.path(), "rn", 0.8, &[0, 0, 1, 2, 2]);

    let registry = r#"{"models": [
        {"model": "DenseNet201", "hyperparameters": {"lr": 0.001, "batch_size": 32},
         "log": "dn_lr3/log.csv", "pred_test": "dn_lr3/pred"},
        {"model": "DenseNet201", "hyperparameters": {"lr": 0.01, "batch_size": 32},
         "log": "dn_lr2/log.csv", "pred_test": "dn_lr2/pred"},
        {"model": "ResNet152", "hyperparameters": {"lr": 0.001, "batch_size": 32},
         "log": "rn/log.csv", "pred_test": "rn/pred"}
    ]}"#;
    fs::write(dir.path().join("models.json"), registry).unwrap();
    fs::write(dir.path().join("gt.csv"), GROUND_TRUTH).unwrap();

    let registry = ModelRegistry::load(dir.path().join("models.json")).unwrap();
    let gt = GroundTruth::load(dir.path().join("gt.csv"), dir.path(), None).unwrap();
    (dir, registry, gt)
}

fn assert_document(svg: &str) {
    assert!(svg.starts_with("<svg"));
    assert!(svg.ends_with("</svg>\n"));
    assert!(!svg.contains("NaN"));
}

#[test]
fn complexity_graph_from_registry_log() {
    let (_dir, registry, _gt) = workspace();
    let log = TrainingLog::load(&registry.models[0].log).unwrap();
    let svg = complexity_graph(
        &log,
        &ComplexityOptions {
            feature_extract_epochs: Some(2),
            ..ComplexityOptions::default()
        },
    )
    .unwrap();
    assert_document(&svg);
    assert!(svg.contains("Start Fine Tuning"));
}

#[test]
fn model_comparison_over_registry() {
    let (_dir, registry, gt) = workspace();
    let scores = [
        (ScoreKind::BalancedAccuracy, "BMA".to_string()),
        (ScoreKind::Accuracy, "Accuracy".to_string()),
    ];
    let opts = ComparisonOptions {
        constant_parameters: [("lr".to_string(), "0.001".to_string())].into_iter().collect(),
        ..ComparisonOptions::default()
    };
    let svg = model_comparison(&registry.models, &gt, &scores, &opts).unwrap().unwrap();
    assert_document(&svg);
    assert!(svg.contains(">DenseNet201<"));
    assert!(svg.contains(">ResNet152<"));
    assert!(svg.contains(">100.00<"));
}

#[test]
fn learning_rate_sweep() {
    let (_dir, registry, gt) = workspace();
    let opts = SweepOptions {
        hyperparameter: "lr".to_string(),
        constant_parameters: BTreeMap::new(),
        ..SweepOptions::default()
    };
    let svg = hyperparameter_over_epochs(&registry.models, &opts).unwrap().unwrap();
    assert_document(&svg);
    assert!(svg.contains("lr=0.001 (Train)"));
    assert!(svg.contains("lr=0.01 (Validation)"));

    let names = vec!["DenseNet201".to_string()];
    let runs = registry.filter(Some(names.as_slice()), &BTreeMap::new());
    let svg = hyperparameter_comparison(
        &runs,
        "lr",
        Some(&gt),
        &HyperparameterComparisonOptions {
            parameter_label: "Learning rate".to_string(),
            ..HyperparameterComparisonOptions::default()
        },
    )
    .unwrap();
    assert_document(&svg);
    assert!(svg.contains("Test BMA"));
}
