use super::mailer::Mailer;
use super::templates;
use crate::constants;
use crate::model::notification::NotificationType;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::{JoinHandle, JoinSet};

/// Everything one email needs, captured by value before the request finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub to_address: String,
    pub to_name: String,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmailJob {
    /// Full template.
    Single(Envelope),
    /// Compact template, sent one after another with a pause in between.
    Batch(Vec<Envelope>),
}

impl EmailJob {
    pub fn len(&self) -> usize {
        match self {
            EmailJob::Single(_) => 1,
            EmailJob::Batch(v) => v.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Per-recipient cap on one send.
    pub send_timeout: Duration,
    pub batch_delay: Duration,
    /// Jobs driven at once.
    pub max_inflight: usize,
    /// How long queued and running jobs get once shutdown is signalled.
    pub shutdown_timeout: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            send_timeout: constants::DEFAULT_EMAIL_SEND_TIMEOUT,
            batch_delay: constants::DEFAULT_EMAIL_BATCH_DELAY,
            max_inflight: constants::DEFAULT_EMAIL_MAX_INFLIGHT,
            shutdown_timeout: constants::EMAIL_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Sending half handed to the engines. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl Outbox {
    pub fn post(&self, job: EmailJob) {
        let n = job.len();
        if self.tx.send(job).is_err() {
            tracing::warn!("email worker is gone, dropping {} message(s)", n);
        }
    }

    /// An outbox whose jobs land in the returned receiver instead of a worker.
    #[cfg(test)]
    pub fn channel() -> (Outbox, mpsc::UnboundedReceiver<EmailJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Outbox { tx }, rx)
    }

    pub fn spawn(mailer: Arc<dyn Mailer>, config: OutboxConfig) -> (Outbox, EmailWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(process(rx, mailer, config, shutdown.clone()));
        (Outbox { tx }, EmailWorker { handle, shutdown })
    }
}

pub struct EmailWorker {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl EmailWorker {
    /// Signals the worker and waits up to `timeout` for it to drain.
    pub async fn shutdown(self, timeout: Duration) {
        self.shutdown.notify_one();
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => tracing::info!("email worker stopped"),
            Ok(Err(e)) => tracing::error!("email worker panicked: {}", e),
            Err(_) => tracing::warn!("email worker did not stop within {:?}", timeout),
        }
    }
}

async fn process(
    mut rx: mpsc::UnboundedReceiver<EmailJob>,
    mailer: Arc<dyn Mailer>,
    config: OutboxConfig,
    shutdown: Arc<Notify>,
) {
    let mut jobs = JoinSet::new();
    loop {
        tokio::select! {
            job = rx.recv(), if jobs.len() < config.max_inflight => match job {
                Some(job) => {
                    jobs.spawn(run_job(mailer.clone(), job, config.clone()));
                }
                None => break,
            },
            Some(res) = jobs.join_next(), if !jobs.is_empty() => {
                if let Err(e) = res {
                    tracing::error!("email job failed to complete: {}", e);
                }
            }
            _ = shutdown.notified() => break,
        }
    }

    rx.close();
    while let Ok(job) = rx.try_recv() {
        jobs.spawn(run_job(mailer.clone(), job, config.clone()));
    }
    let drain = async { while jobs.join_next().await.is_some() {} };
    if tokio::time::timeout(config.shutdown_timeout, drain).await.is_err() {
        tracing::warn!("abandoning {} email job(s) at shutdown", jobs.len());
    }
}

/// Returns how many messages were delivered.
async fn run_job(mailer: Arc<dyn Mailer>, job: EmailJob, config: OutboxConfig) -> usize {
    match job {
        EmailJob::Single(env) => {
            let html = templates::notification_email(&env.to_name, env.kind, &env.title, &env.message);
            deliver(mailer.as_ref(), &env, html.as_str(), config.send_timeout).await as usize
        }
        EmailJob::Batch(envs) => {
            let total = envs.len();
            let mut sent = 0;
            for (i, env) in envs.iter().enumerate() {
                let html = templates::compact_email(&env.to_name, &env.title, &env.message);
                if deliver(mailer.as_ref(), env, html.as_str(), config.send_timeout).await {
                    sent += 1;
                }
                if i + 1 < total {
                    tokio::time::sleep(config.batch_delay).await;
                }
            }
            tracing::info!("bulk email sent {}/{}", sent, total);
            sent
        }
    }
}

async fn deliver(mailer: &dyn Mailer, env: &Envelope, html: &str, limit: Duration) -> bool {
    let subject = templates::subject(&env.title);
    let send = mailer.send(&env.to_address, &env.to_name, subject.as_str(), html);
    match tokio::time::timeout(limit, send).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!("email to {} failed: {}", env.to_address, e);
            false
        }
        Err(_) => {
            tracing::warn!("email to {} timed out after {:?}", env.to_address, limit);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails for `fail@`, hangs for `slow@`, records everything it delivers.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for Recorder {
        async fn send(&self, to: &str, _: &str, subject: &str, _: &str) -> anyhow::Result<()> {
            if to.starts_with("fail@") {
                return Err(anyhow::Error::msg("mailbox full"));
            }
            if to.starts_with("slow@") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn env(to: &str) -> Envelope {
        Envelope {
            to_address: to.to_string(),
            to_name: "Someone".to_string(),
            kind: NotificationType::System,
            title: "Hello".to_string(),
            message: "body".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn batch_continues_past_failures_and_timeouts() {
        let recorder = Arc::new(Recorder::default());
        let job = EmailJob::Batch(vec![
            env("a@campus.test"),
            env("fail@campus.test"),
            env("slow@campus.test"),
            env("d@campus.test"),
        ]);
        let sent = run_job(recorder.clone(), job, OutboxConfig::default()).await;
        assert_eq!(sent, 2);
        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                ("a@campus.test".to_string(), "Campus Learn: Hello".to_string()),
                ("d@campus.test".to_string(), "Campus Learn: Hello".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn worker_drains_on_shutdown() {
        let recorder = Arc::new(Recorder::default());
        let config = OutboxConfig {
            batch_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let (outbox, worker) = Outbox::spawn(recorder.clone(), config);
        outbox.post(EmailJob::Single(env("a@campus.test")));
        outbox.post(EmailJob::Batch(vec![env("b@campus.test"), env("c@campus.test")]));
        worker.shutdown(Duration::from_secs(5)).await;
        assert_eq!(recorder.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn posting_after_worker_is_gone_does_not_panic() {
        let (outbox, rx) = Outbox::channel();
        drop(rx);
        outbox.post(EmailJob::Single(env("a@campus.test")));
    }
}
