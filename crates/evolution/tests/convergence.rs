mod common;

use common::quick_config;
use polytune_core::{Channel, MeasurementRegime, WeightMode};
use polytune_evolution::SearchController;
use polytune_measure::SimulatedPort;
use polytune_storage::MemorySink;

#[tokio::test]
async fn test_converges_near_cache_optimum() {
    let port = SimulatedPort::for_channel(Channel::Cache).with_seed(9);
    let optimum = port.optimum();
    let config = quick_config()
        .with_weight_mode(WeightMode::Variation)
        .with_stop_threshold(1e-9);
    let sink = MemorySink::default();

    let mut controller =
        SearchController::new(port, Channel::Cache, Channel::Cache.default_initial_params(), config)
            .unwrap()
            .with_sink(Box::new(sink.clone()));
    let outcome = controller.run().await.unwrap();

    assert!(outcome.converged, "did not converge in {} iterations", outcome.iterations);
    assert!(outcome.iterations < 3000);
    assert_eq!(outcome.regime, MeasurementRegime::Full);

    let steps = Channel::Cache.default_initial_params().noise_steps();
    let params = outcome.final_params;
    for i in 0..4 {
        let offset = (params[i] as f64 - optimum[i] as f64).abs();
        assert!(offset <= steps[i].max(1.0), "dimension {i}: {params} vs {optimum}");
    }
    assert_eq!(params[2], 0);
    assert_eq!(params[3], 0);

    assert!(outcome.best_score.is_finite());
    assert_eq!(outcome.best_params[2], 0);
    assert_eq!(outcome.best_params[3], 0);
    assert_eq!(controller.port().contaminated_samples(), 0);

    let records = sink.records().await;
    assert_eq!(records.len(), outcome.iterations);
    assert!(records.iter().all(|r| r.run_id == outcome.run_id));
    assert!(records.iter().enumerate().all(|(i, r)| r.iteration == i + 1));
    assert!(records[0].score_diff.is_infinite());
}

#[tokio::test]
async fn test_default_weighting_terminates_within_budget() {
    let port = SimulatedPort::for_channel(Channel::Cache).with_seed(3);
    let config = quick_config().with_max_iters(200);

    let mut controller =
        SearchController::new(port, Channel::Cache, Channel::Cache.default_initial_params(), config).unwrap();
    let outcome = controller.run().await.unwrap();

    assert!(outcome.iterations >= 1 && outcome.iterations <= 200);
    assert_eq!(outcome.next_population.len(), 10);
    assert!(outcome.next_population.iter().all(|v| v[2] == 0 && v[3] == 0));
}

#[tokio::test]
async fn test_virtualised_host_runs_degraded() {
    let port = SimulatedPort::for_channel(Channel::Tlb).without_hardware_counters();
    let config = quick_config().with_max_iters(20);

    let mut controller =
        SearchController::new(port, Channel::Tlb, Channel::Tlb.default_initial_params(), config).unwrap();
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome.regime, MeasurementRegime::Degraded);
    assert_eq!(outcome.baseline.unwrap().regime, MeasurementRegime::Degraded);
    assert!(outcome.best_score <= 0.0);
    assert!(outcome.iterations >= 2);
    // frozen dimensions
    assert!(outcome.final_params.genes()[1..].iter().all(|&g| g == 0));
}

#[tokio::test]
async fn test_final_params_is_best_of_last_measured_generation() {
    let port = SimulatedPort::for_channel(Channel::Cache).with_seed(5);
    let config = quick_config().with_max_iters(6).with_mutation_p(0.5);
    let sink = MemorySink::default();

    let mut controller =
        SearchController::new(port, Channel::Cache, Channel::Cache.default_initial_params(), config)
            .unwrap()
            .with_sink(Box::new(sink.clone()));
    let outcome = controller.run().await.unwrap();

    let records = sink.records().await;
    let last = records.last().unwrap();
    assert_eq!(last.iteration, outcome.iterations);
    assert_eq!(outcome.final_params, last.best_params);
    assert_eq!(outcome.next_population.len(), 10);
}
