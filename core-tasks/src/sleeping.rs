use crate::counter::Counter;
use crate::task::Task;

/// A task taken out of the ready sequence while its wait target is nonzero.
#[derive(Debug)]
pub(crate) struct SleepingTask {
    task: Task,
    target: Counter,
}

impl SleepingTask {
    /// Parks `task` if it is suspended on a nonzero target; otherwise hands
    /// it back unchanged.
    pub(crate) fn park(task: Task) -> Result<Self, Task> {
        if !task.is_parked() {
            return Err(task);
        }
        match task.wait_target().cloned() {
            Some(target) => Ok(Self { task, target }),
            None => Err(task),
        }
    }

    pub(crate) fn is_waiting_on(&self, counter: &Counter) -> bool {
        self.target.ptr_eq(counter)
    }

    pub(crate) fn target(&self) -> &Counter {
        &self.target
    }

    /// Returns the task for requeueing.
    pub(crate) fn wake(self) -> Task {
        self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::test_support::suspend_always;
    use crate::gate::suspend_until;

    fn gated_task(target: &Counter) -> Task {
        let target = target.clone();
        let mut task = Task::new(move || async move {
            suspend_until(&target).await;
        });
        task.run().unwrap();
        task
    }

    #[test]
    fn parks_task_waiting_on_nonzero_target() {
        let target = Counter::new(2);
        let sleeper = SleepingTask::park(gated_task(&target)).unwrap();

        assert!(sleeper.is_waiting_on(&target));
        assert!(!sleeper.is_waiting_on(&Counter::new(2)));
        assert_eq!(sleeper.target(), &target);
        assert!(sleeper.task.is_parked());
    }

    #[test]
    fn refuses_task_whose_target_reached_zero() {
        let target = Counter::new(0);
        let task = gated_task(&target);
        assert!(SleepingTask::park(task).is_err());
    }

    #[test]
    fn refuses_task_without_target() {
        let mut task = Task::new(|| suspend_always(1));
        task.run().unwrap();
        let task = SleepingTask::park(task).unwrap_err();
        assert!(!task.is_complete());
    }

    #[test]
    fn wake_returns_the_same_task() {
        let target = Counter::new(1);
        let task = gated_task(&target);
        let id = task.id();

        let sleeper = SleepingTask::park(task).unwrap();
        target.decrement_and_check();
        let mut task = sleeper.wake();

        assert_eq!(task.id(), id);
        task.run().unwrap();
        assert!(task.is_complete());
    }
}
