// Ideaflow - Fan-out of one task over a list of inputs

use super::{InstanceOutcome, MappedInstance, TaskOutcome};
use futures_util::{stream, StreamExt};
use std::future::Future;
use std::time::Instant;

/// Run `task(map_index, input)` once per input, keeping at most `max_active`
/// instances in flight.
///
/// Instances may finish in any order; the returned list is sorted by
/// `map_index` so it lines up with `inputs`.
pub async fn expand<I, T, F, Fut>(
    task_id: &str,
    inputs: Vec<I>,
    max_active: usize,
    task: F,
) -> Vec<MappedInstance<T>>
where
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = anyhow::Result<TaskOutcome<T>>>,
{
    let max_active = max_active.max(1);
    tracing::info!(
        task_id = %task_id,
        instances = inputs.len(),
        max_active = max_active,
        "Expanding mapped task"
    );

    let task = &task;
    let mut instances: Vec<MappedInstance<T>> = stream::iter(inputs.into_iter().enumerate())
        .map(|(map_index, input)| async move {
            tracing::debug!(task_id = %task_id, map_index = map_index, "Task instance started");
            let started = Instant::now();
            let result = task(map_index, input).await;
            let instance = MappedInstance::new(map_index, result, started.elapsed());
            log_instance(task_id, &instance);
            instance
        })
        .buffer_unordered(max_active)
        .collect()
        .await;

    instances.sort_by_key(|i| i.map_index);
    instances
}

fn log_instance<T>(task_id: &str, instance: &MappedInstance<T>) {
    let duration_ms = instance.duration.as_millis() as u64;
    match &instance.outcome {
        InstanceOutcome::Success(_) => tracing::info!(
            task_id = %task_id,
            map_index = instance.map_index,
            duration_ms = duration_ms,
            "Task instance succeeded"
        ),
        InstanceOutcome::Skipped(reason) => tracing::warn!(
            task_id = %task_id,
            map_index = instance.map_index,
            reason = %reason,
            "Task instance skipped"
        ),
        InstanceOutcome::Failed(e) => tracing::error!(
            task_id = %task_id,
            map_index = instance.map_index,
            duration_ms = duration_ms,
            "Task instance failed: {:#}",
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::TaskState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        crate::logger::init_test();

        // Earlier inputs sleep longer, so they finish last.
        let inputs = vec![30u64, 20, 10, 0];
        let instances = expand("sleepy", inputs, 4, |idx, ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(TaskOutcome::Done(idx * 10))
        })
        .await;

        let indices: Vec<usize> = instances.iter().map(|i| i.map_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        let values: Vec<usize> = instances
            .into_iter()
            .map(|i| match i.outcome {
                InstanceOutcome::Success(v) => v,
                other => panic!("unexpected outcome: {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![0, 10, 20, 30]);
    }

    #[tokio::test]
    async fn test_respects_max_active() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let instances = expand("bounded", (0..8).collect::<Vec<_>>(), 3, |_, n: i32| {
            let active = &active;
            let peak = &peak;
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(TaskOutcome::Done(n))
            }
        })
        .await;

        assert_eq!(instances.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_mixed_outcomes() {
        let inputs = vec![Some("a"), None, Some("fail")];
        let instances = expand("mixed", inputs, 0, |_, input| async move {
            match input {
                None => Ok(TaskOutcome::skip("nothing")),
                Some("fail") => Err(anyhow::anyhow!("boom")),
                Some(v) => Ok(TaskOutcome::Done(v)),
            }
        })
        .await;

        let states: Vec<TaskState> = instances.iter().map(|i| i.state()).collect();
        assert_eq!(
            states,
            vec![TaskState::Success, TaskState::Skipped, TaskState::Failed]
        );
    }

    #[tokio::test]
    async fn test_empty_input() {
        let instances: Vec<MappedInstance<()>> =
            expand("empty", Vec::<u8>::new(), 4, |_, _| async { Ok(TaskOutcome::Done(())) }).await;
        assert!(instances.is_empty());
    }
}
