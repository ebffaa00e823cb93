//! Lazy shared predictor behavior under concurrent first use

mod common;

use common::{fixture, solid_png, CountingFactory};
use cropdx::{predict_from_bytes, predict_from_reader, ModelKind, PredictOptions, SharedPredictor};
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_first_use_loads_once() {
    let f = fixture(Some(b"primary"), Some(b"fallback"));
    let factory = CountingFactory::fixed(&[0.4, 0.3, 0.2, 0.1]);
    let shared = Arc::new(SharedPredictor::new(f.config.clone(), Arc::new(factory.clone())));
    assert!(!shared.is_initialized());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move { shared.get().await })
        })
        .collect();

    let mut predictors = Vec::new();
    for handle in handles {
        predictors.push(handle.await.unwrap());
    }

    assert_eq!(factory.loads(), 1);
    assert!(predictors.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert!(shared.is_initialized());
    assert_eq!(
        shared.get_if_initialized().and_then(|p| p.model_kind()),
        Some(ModelKind::Primary)
    );
}

#[tokio::test]
async fn test_unavailable_outcome_is_shared() {
    let f = fixture(None, None);
    let factory = CountingFactory::fixed(&[0.25; 4]);
    let shared = SharedPredictor::new(f.config.clone(), Arc::new(factory.clone()));

    let first = shared.get().await;
    let second = shared.get().await;
    assert!(!first.is_available());
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_async_helpers() {
    let f = fixture(Some(b"primary"), None);
    let factory = CountingFactory::fixed(&[0.1, 0.1, 0.7, 0.1]);
    let shared = SharedPredictor::new(f.config.clone(), Arc::new(factory));

    let response = predict_from_bytes(
        solid_png(12, 12, 30),
        "leaf.png",
        &shared,
        PredictOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(response.top_prediction.unwrap().class_index, 2);

    let bytes = solid_png(12, 12, 30);
    let response = predict_from_reader(
        std::io::Cursor::new(bytes),
        "leaf.png",
        &shared,
        PredictOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(response.result.len(), 4);
}
