use crate::domain::errors::PredictorError;
use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, Sender};
use ndarray::{Array2, Array3, ArrayView3};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Interface for the trained sequence model.
///
/// Input is `[batch, window_size, num_features]` of scaled values, output is
/// `[batch, num_features]` in the same scaled space. Implementations are
/// loaded once and shared read-only across requests.
pub trait SequencePredictor: Send + Sync {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array2<f64>, PredictorError>;

    /// Get model name/type
    fn name(&self) -> &str;

    /// Get model version/id
    fn version(&self) -> &str;

    /// Number of trainable parameters, when the artifact exposes it.
    fn parameter_count(&self) -> Option<u64> {
        None
    }
}

type Reply = Result<Array2<f64>, PredictorError>;
type Job = (Array3<f64>, Sender<Reply>);

/// Bounds every predictor call with a timeout.
///
/// Calls run one at a time on a single long-lived worker thread. A call that
/// overruns is abandoned, not cancelled: the worker stays busy until the
/// model returns, and calls made meanwhile time out waiting for it instead of
/// starting new threads. The worker is respawned if it dies.
pub struct TimedPredictor {
    inner: Arc<dyn SequencePredictor>,
    timeout: Duration,
    worker: Mutex<Option<Sender<Job>>>,
}

impl TimedPredictor {
    pub fn new(inner: Arc<dyn SequencePredictor>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> Result<Sender<Job>, PredictorError> {
        let mut slot = self.worker.lock().map_err(|_| PredictorError::Disconnected)?;
        if let Some(jobs) = slot.as_ref() {
            return Ok(jobs.clone());
        }

        // Rendezvous channel: a send only completes when the worker is idle.
        let (jobs, queue) = crossbeam_channel::bounded::<Job>(0);
        let inner = Arc::clone(&self.inner);
        std::thread::Builder::new()
            .name("predictor-worker".to_string())
            .spawn(move || {
                for (input, reply) in queue {
                    // Caller may be gone after a timeout.
                    let _ = reply.send(inner.predict(input.view()));
                }
                debug!("Predictor worker for '{}' stopped", inner.name());
            })
            .map_err(|e| PredictorError::Inference {
                reason: format!("failed to spawn predictor worker: {}", e),
            })?;

        *slot = Some(jobs.clone());
        Ok(jobs)
    }

    fn forget_worker(&self) {
        if let Ok(mut slot) = self.worker.lock() {
            *slot = None;
        }
    }

    fn timed_out(&self) -> PredictorError {
        let timeout_ms = self.timeout.as_millis() as u64;
        error!("Predictor '{}' timed out after {}ms", self.inner.name(), timeout_ms);
        PredictorError::Timeout { timeout_ms }
    }
}

impl SequencePredictor for TimedPredictor {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array2<f64>, PredictorError> {
        let deadline = Instant::now() + self.timeout;
        let jobs = self.worker()?;
        let (reply, answer) = crossbeam_channel::bounded(1);

        match jobs.send_deadline((input.to_owned(), reply), deadline) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => return Err(self.timed_out()),
            Err(SendTimeoutError::Disconnected(_)) => {
                self.forget_worker();
                return Err(PredictorError::Disconnected);
            }
        }

        match answer.recv_deadline(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out()),
            Err(RecvTimeoutError::Disconnected) => {
                // Worker panicked mid-call
                self.forget_worker();
                Err(PredictorError::Disconnected)
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> &str {
        self.inner.version()
    }

    fn parameter_count(&self) -> Option<u64> {
        self.inner.parameter_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{FailingPredictor, LastValuePredictor, SlowPredictor};

    #[test]
    fn test_timed_predictor_passes_through() {
        let timed = TimedPredictor::new(Arc::new(LastValuePredictor), Duration::from_secs(1));
        let input = Array3::from_shape_vec((1, 3, 1), vec![10.0, 11.0, 12.0]).unwrap();

        let output = timed.predict(input.view()).unwrap();
        assert_eq!(output.shape(), &[1, 1]);
        assert_eq!(output[[0, 0]], 12.0);
    }

    #[test]
    fn test_timed_predictor_times_out() {
        let slow = SlowPredictor::new(Duration::from_millis(500));
        let timed = TimedPredictor::new(Arc::new(slow), Duration::from_millis(20));
        let input = Array3::<f64>::zeros((1, 2, 1));

        let result = timed.predict(input.view());
        assert!(matches!(result, Err(PredictorError::Timeout { timeout_ms: 20 })));
    }

    #[test]
    fn test_hung_model_does_not_pile_up_calls() {
        let slow = Arc::new(SlowPredictor::new(Duration::from_secs(2)));
        let timed = TimedPredictor::new(slow.clone(), Duration::from_millis(10));
        let input = Array3::<f64>::zeros((1, 2, 1));

        for _ in 0..20 {
            assert!(matches!(
                timed.predict(input.view()),
                Err(PredictorError::Timeout { timeout_ms: 10 })
            ));
        }
        // Only the first call reached the model; the rest waited for the one worker
        assert_eq!(slow.started(), 1);
    }

    #[test]
    fn test_worker_is_reused_across_calls() {
        let slow = Arc::new(SlowPredictor::new(Duration::from_millis(1)));
        let timed = TimedPredictor::new(slow.clone(), Duration::from_secs(1));
        let input = Array3::from_shape_vec((1, 2, 1), vec![3.0, 4.0]).unwrap();

        for _ in 0..5 {
            let output = timed.predict(input.view()).unwrap();
            assert_eq!(output[[0, 0]], 4.0);
        }
        assert_eq!(slow.started(), 5);
    }

    #[test]
    fn test_timed_predictor_propagates_errors() {
        let timed = TimedPredictor::new(
            Arc::new(FailingPredictor::after(0)),
            Duration::from_secs(1),
        );
        let input = Array3::<f64>::zeros((1, 2, 1));
        assert!(matches!(
            timed.predict(input.view()),
            Err(PredictorError::Inference { .. })
        ));
    }
}
