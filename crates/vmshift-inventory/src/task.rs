//! Platform task polling.
//!
//! Control planes answer mutating calls with a task handle and finish the
//! work asynchronously. [`wait_for_task`] blocks on such a handle until it
//! reaches a terminal state; [`TaskExecutor`] wraps any [`TaskBackend`] so
//! the advisor sees a plain blocking [`MigrationExecutor`].

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::TaskError;
use crate::provider::MigrationExecutor;

/// State of a platform task as reported at poll time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error(String),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error(_))
    }
}

/// Handle to an in-flight platform task.
pub trait Task {
    fn state(&self) -> Result<TaskState, TaskError>;
}

/// Starts platform tasks. Each method returns as soon as the platform has
/// accepted the request.
pub trait TaskBackend {
    type Task: Task;

    fn start_relocate(&self, vm: &str, target_host: &str) -> Result<Self::Task, TaskError>;

    fn start_power_off(&self, vm: &str) -> Result<Self::Task, TaskError>;

    fn start_power_on(&self, vm: &str) -> Result<Self::Task, TaskError>;

    fn start_maintenance(&self, host: &str, enter: bool) -> Result<Self::Task, TaskError>;

    fn start_reboot(&self, host: &str) -> Result<Self::Task, TaskError>;

    fn start_reconnect(&self, host: &str) -> Result<Self::Task, TaskError>;

    fn start_destroy(&self, vm: &str) -> Result<Self::Task, TaskError>;
}

impl<T: TaskBackend + ?Sized> TaskBackend for &T {
    type Task = T::Task;

    fn start_relocate(&self, vm: &str, target_host: &str) -> Result<Self::Task, TaskError> {
        (**self).start_relocate(vm, target_host)
    }

    fn start_power_off(&self, vm: &str) -> Result<Self::Task, TaskError> {
        (**self).start_power_off(vm)
    }

    fn start_power_on(&self, vm: &str) -> Result<Self::Task, TaskError> {
        (**self).start_power_on(vm)
    }

    fn start_maintenance(&self, host: &str, enter: bool) -> Result<Self::Task, TaskError> {
        (**self).start_maintenance(host, enter)
    }

    fn start_reboot(&self, host: &str) -> Result<Self::Task, TaskError> {
        (**self).start_reboot(host)
    }

    fn start_reconnect(&self, host: &str) -> Result<Self::Task, TaskError> {
        (**self).start_reconnect(host)
    }

    fn start_destroy(&self, vm: &str) -> Result<Self::Task, TaskError> {
        (**self).start_destroy(vm)
    }
}

/// Polling cadence for [`wait_for_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Sleep between polls. Zero polls back-to-back.
    pub interval: Duration,
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: None,
        }
    }
}

/// Block until `task` succeeds or fails.
pub fn wait_for_task<T: Task + ?Sized>(task: &T, poll: &PollSettings) -> Result<(), TaskError> {
    let started = Instant::now();
    let mut polls: u64 = 0;

    loop {
        polls += 1;
        match task.state()? {
            TaskState::Success => {
                debug!(polls, elapsed_ms = started.elapsed().as_millis() as u64, "task succeeded");
                return Ok(());
            }
            TaskState::Error(reason) => {
                warn!(polls, %reason, "task failed");
                return Err(TaskError::Failed(reason));
            }
            TaskState::Queued | TaskState::Running => {}
        }

        if let Some(timeout) = poll.timeout {
            if started.elapsed() >= timeout {
                warn!(polls, ?timeout, "task timed out");
                return Err(TaskError::Timeout(timeout));
            }
        }

        if !poll.interval.is_zero() {
            std::thread::sleep(poll.interval);
        }
    }
}

/// Adapts a [`TaskBackend`] into a blocking [`MigrationExecutor`].
pub struct TaskExecutor<B> {
    backend: B,
    poll: PollSettings,
}

impl<B: TaskBackend> TaskExecutor<B> {
    pub fn new(backend: B, poll: PollSettings) -> Self {
        Self { backend, poll }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_inner(self) -> B {
        self.backend
    }
}

impl<B: TaskBackend> MigrationExecutor for TaskExecutor<B> {
    fn relocate(&self, vm: &str, target_host: &str) -> Result<(), TaskError> {
        let task = self.backend.start_relocate(vm, target_host)?;
        wait_for_task(&task, &self.poll)
    }

    fn power_off(&self, vm: &str) -> Result<(), TaskError> {
        let task = self.backend.start_power_off(vm)?;
        wait_for_task(&task, &self.poll)
    }

    fn power_on(&self, vm: &str) -> Result<(), TaskError> {
        let task = self.backend.start_power_on(vm)?;
        wait_for_task(&task, &self.poll)
    }

    fn set_maintenance(&self, host: &str, enter: bool) -> Result<(), TaskError> {
        let task = self.backend.start_maintenance(host, enter)?;
        wait_for_task(&task, &self.poll)
    }

    fn reboot_host(&self, host: &str) -> Result<(), TaskError> {
        let task = self.backend.start_reboot(host)?;
        wait_for_task(&task, &self.poll)
    }

    fn reconnect_host(&self, host: &str) -> Result<(), TaskError> {
        let task = self.backend.start_reconnect(host)?;
        wait_for_task(&task, &self.poll)
    }

    fn destroy_vm(&self, vm: &str) -> Result<(), TaskError> {
        let task = self.backend.start_destroy(vm)?;
        wait_for_task(&task, &self.poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Reports a fixed sequence of states, repeating the last one.
    struct ScriptedTask {
        states: RefCell<VecDeque<TaskState>>,
        polls: RefCell<u32>,
    }

    impl ScriptedTask {
        fn new(states: Vec<TaskState>) -> Self {
            Self {
                states: RefCell::new(states.into()),
                polls: RefCell::new(0),
            }
        }
    }

    impl Task for ScriptedTask {
        fn state(&self) -> Result<TaskState, TaskError> {
            *self.polls.borrow_mut() += 1;
            let mut states = self.states.borrow_mut();
            if states.len() > 1 {
                Ok(states.pop_front().unwrap())
            } else {
                Ok(states.front().cloned().unwrap_or(TaskState::Running))
            }
        }
    }

    fn busy_poll() -> PollSettings {
        PollSettings {
            interval: Duration::ZERO,
            timeout: None,
        }
    }

    #[test]
    fn waits_through_running_states() {
        let task = ScriptedTask::new(vec![
            TaskState::Queued,
            TaskState::Running,
            TaskState::Running,
            TaskState::Success,
        ]);

        wait_for_task(&task, &busy_poll()).unwrap();
        assert_eq!(*task.polls.borrow(), 4);
    }

    #[test]
    fn error_state_carries_reason() {
        let task = ScriptedTask::new(vec![
            TaskState::Running,
            TaskState::Error("insufficient resources".to_string()),
        ]);

        let err = wait_for_task(&task, &busy_poll()).unwrap_err();
        match err {
            TaskError::Failed(reason) => assert_eq!(reason, "insufficient resources"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn timeout_stops_a_stuck_task() {
        let task = ScriptedTask::new(vec![TaskState::Running]);
        let poll = PollSettings {
            interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(5)),
        };

        let err = wait_for_task(&task, &poll).unwrap_err();
        assert!(matches!(err, TaskError::Timeout(_)));
    }

    #[test]
    fn terminal_states() {
        assert!(TaskState::Success.is_terminal());
        assert!(TaskState::Error(String::new()).is_terminal());
        assert!(!TaskState::Queued.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    struct ScriptedBackend {
        started: RefCell<Vec<String>>,
    }

    impl TaskBackend for ScriptedBackend {
        type Task = ScriptedTask;

        fn start_relocate(&self, vm: &str, target_host: &str) -> Result<ScriptedTask, TaskError> {
            self.started.borrow_mut().push(format!("relocate {vm} {target_host}"));
            Ok(ScriptedTask::new(vec![TaskState::Running, TaskState::Success]))
        }

        fn start_power_off(&self, vm: &str) -> Result<ScriptedTask, TaskError> {
            self.started.borrow_mut().push(format!("off {vm}"));
            Ok(ScriptedTask::new(vec![TaskState::Success]))
        }

        fn start_power_on(&self, vm: &str) -> Result<ScriptedTask, TaskError> {
            self.started.borrow_mut().push(format!("on {vm}"));
            Ok(ScriptedTask::new(vec![TaskState::Error("no license".to_string())]))
        }

        fn start_maintenance(&self, host: &str, enter: bool) -> Result<ScriptedTask, TaskError> {
            self.started.borrow_mut().push(format!("maintenance {host} {enter}"));
            Ok(ScriptedTask::new(vec![TaskState::Success]))
        }

        fn start_reboot(&self, host: &str) -> Result<ScriptedTask, TaskError> {
            self.started.borrow_mut().push(format!("reboot {host}"));
            Ok(ScriptedTask::new(vec![TaskState::Queued, TaskState::Success]))
        }

        fn start_reconnect(&self, host: &str) -> Result<ScriptedTask, TaskError> {
            self.started.borrow_mut().push(format!("reconnect {host}"));
            Ok(ScriptedTask::new(vec![TaskState::Success]))
        }

        fn start_destroy(&self, vm: &str) -> Result<ScriptedTask, TaskError> {
            self.started.borrow_mut().push(format!("destroy {vm}"));
            Ok(ScriptedTask::new(vec![TaskState::Success]))
        }
    }

    #[test]
    fn task_executor_blocks_on_backend_tasks() {
        let backend = ScriptedBackend {
            started: RefCell::new(Vec::new()),
        };
        let executor = TaskExecutor::new(backend, busy_poll());

        executor.relocate("web-1", "esx-2").unwrap();
        executor.power_off("web-1").unwrap();
        assert!(executor.power_on("web-1").is_err());
        executor.set_maintenance("esx-1", true).unwrap();
        executor.reboot_host("esx-1").unwrap();
        executor.reconnect_host("esx-1").unwrap();
        executor.destroy_vm("Unknown-1").unwrap();

        let started = executor.into_inner().started.into_inner();
        assert_eq!(
            started,
            vec![
                "relocate web-1 esx-2",
                "off web-1",
                "on web-1",
                "maintenance esx-1 true",
                "reboot esx-1",
                "reconnect esx-1",
                "destroy Unknown-1",
            ]
        );
    }
}
