//! Model latency benchmark.
//!
//! Asks each model the same question a few times and records how long every complete
//! answer took.  The first answer usually includes loading the model, so comparing the
//! first two runs shows how much of the latency is warm-up.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::gateway::ModelGateway;
use crate::types::ProviderMessage;

/// Models benchmarked when none are named.
pub const DEFAULT_MODELS: &[&str] = &[
    "tinyllama",
    "llama3",
    "codellama",
    "gemma3:4b",
    "gemma3:12b-it-qat",
    "mistral",
    "phi4-mini",
    "phi4",
];

/// Question asked when none is given.
pub const DEFAULT_PROMPT: &str = "Was ist der Sinn des Lebens?";

/// Runs per model when not specified.
pub const DEFAULT_RUNS: usize = 2;

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunTiming {
    Completed { seconds: f64 },
    Failed { error: String },
}

impl RunTiming {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            RunTiming::Completed { seconds } => Some(*seconds),
            RunTiming::Failed { .. } => None,
        }
    }
}

/// All runs for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBenchmark {
    pub model: String,
    pub runs: Vec<RunTiming>,
}

impl ModelBenchmark {
    /// How much faster the second run was than the first, in percent.
    ///
    /// Negative when the second run was slower.  `None` unless both of the first two runs
    /// completed and the first took a measurable amount of time.
    pub fn improvement_percent(&self) -> Option<f64> {
        let first = self.runs.first()?.seconds()?;
        let second = self.runs.get(1)?.seconds()?;
        if first <= 0.0 {
            return None;
        }
        Some((first - second) / first * 100.0)
    }

    /// True if any run failed.
    pub fn failed(&self) -> bool {
        self.runs
            .iter()
            .any(|run| matches!(run, RunTiming::Failed { .. }))
    }
}

/// Results of a whole benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    #[serde(with = "crate::utils::time")]
    pub started_at: OffsetDateTime,
    pub prompt: String,
    pub results: Vec<ModelBenchmark>,
}

/// Benchmark every model in `models` with `runs` requests each.
///
/// A failed request is recorded and ends the runs for that model; the benchmark moves
/// on to the next one.
pub async fn benchmark_models<G, M>(
    gateway: &G,
    models: &[M],
    prompt: &str,
    runs: usize,
) -> BenchmarkReport
where
    G: ModelGateway + ?Sized,
    M: AsRef<str>,
{
    let started_at = OffsetDateTime::now_utc();
    let mut results = Vec::with_capacity(models.len());
    for model in models {
        results.push(benchmark_model(gateway, model.as_ref(), prompt, runs).await);
    }
    BenchmarkReport {
        started_at,
        prompt: prompt.to_string(),
        results,
    }
}

async fn benchmark_model<G: ModelGateway + ?Sized>(
    gateway: &G,
    model: &str,
    prompt: &str,
    runs: usize,
) -> ModelBenchmark {
    let mut timings = Vec::with_capacity(runs);
    for _ in 0..runs {
        let start = Instant::now();
        match gateway
            .chat_once(model, vec![ProviderMessage::user(prompt)])
            .await
        {
            Ok(_) => timings.push(RunTiming::Completed {
                seconds: start.elapsed().as_secs_f64(),
            }),
            Err(err) => {
                timings.push(RunTiming::Failed {
                    error: err.to_string(),
                });
                break;
            }
        }
    }
    ModelBenchmark {
        model: model.to_string(),
        runs: timings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::gateway::{FragmentStream, error_stream};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CountingGateway {
        missing: &'static str,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModelGateway for CountingGateway {
        async fn chat_once(&self, model: &str, history: Vec<ProviderMessage>) -> Result<String> {
            assert_eq!(history, vec![ProviderMessage::user("Warum?")]);
            self.calls.lock().unwrap().push(model.to_string());
            if model == self.missing {
                return Err(Error::not_found(
                    format!("model \"{model}\" not found"),
                    Some("model".to_string()),
                    Some(model.to_string()),
                ));
            }
            Ok("Darum.".to_string())
        }

        async fn chat_stream(&self, _model: &str, _history: Vec<ProviderMessage>) -> FragmentStream {
            error_stream(&Error::unknown("not used"))
        }
    }

    fn bench(runs: Vec<RunTiming>) -> ModelBenchmark {
        ModelBenchmark {
            model: "m".to_string(),
            runs,
        }
    }

    #[test]
    fn improvement_percent() {
        let result = bench(vec![
            RunTiming::Completed { seconds: 10.0 },
            RunTiming::Completed { seconds: 2.5 },
        ]);
        assert_eq!(result.improvement_percent(), Some(75.0));

        let slower = bench(vec![
            RunTiming::Completed { seconds: 4.0 },
            RunTiming::Completed { seconds: 5.0 },
        ]);
        assert_eq!(slower.improvement_percent(), Some(-25.0));
    }

    #[test]
    fn improvement_needs_two_successful_runs() {
        assert_eq!(bench(vec![]).improvement_percent(), None);
        assert_eq!(
            bench(vec![RunTiming::Completed { seconds: 1.0 }]).improvement_percent(),
            None
        );
        assert_eq!(
            bench(vec![
                RunTiming::Completed { seconds: 1.0 },
                RunTiming::Failed {
                    error: "x".to_string()
                },
            ])
            .improvement_percent(),
            None
        );
        assert_eq!(
            bench(vec![
                RunTiming::Completed { seconds: 0.0 },
                RunTiming::Completed { seconds: 1.0 },
            ])
            .improvement_percent(),
            None
        );
    }

    #[tokio::test]
    async fn failure_stops_that_model_only() {
        let gateway = CountingGateway {
            missing: "llama9",
            calls: Mutex::new(Vec::new()),
        };
        let report = benchmark_models(&gateway, &["llama9", "gemma3:1b"], "Warum?", 3).await;

        assert_eq!(report.prompt, "Warum?");
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].runs.len(), 1);
        assert!(report.results[0].failed());
        assert_eq!(report.results[1].runs.len(), 3);
        assert!(!report.results[1].failed());
        assert_eq!(
            *gateway.calls.lock().unwrap(),
            vec!["llama9", "gemma3:1b", "gemma3:1b", "gemma3:1b"]
        );
    }

    #[test]
    fn run_timing_serialization() {
        let json = serde_json::to_value(RunTiming::Failed {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "failed", "error": "boom"}));
        let json = serde_json::to_value(RunTiming::Completed { seconds: 1.5 }).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "completed", "seconds": 1.5}));
    }
}
