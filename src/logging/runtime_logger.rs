// src/logging/runtime_logger.rs

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, Sender, Receiver};
use tokio::sync::oneshot;
use tokio::time::{self, Duration};
use tokio::task;
use tracing_appender::rolling;
use tracing_appender::rolling::RollingFileAppender;
use serde_json::json;
use chrono::Utc;
use tracing_subscriber::fmt::MakeWriter;

use crate::logging::session_log::SessionLog;

/// 需要分文件存储的日志级别
const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// 单条日志消息
pub struct LogEntry {
    pub level: String,
    pub content: String,
}

enum LogCommand {
    Entry(LogEntry),
    /// 立即把所有缓冲写盘，完成后回执
    Flush(oneshot::Sender<()>),
}

/// 运行日志管理器（RuntimeLogger）
/// 将运行时日志和会话日志按级别分流到不同的日志文件中。
pub struct RuntimeLogger {
    sender: Sender<LogCommand>,
    log_dir: PathBuf,
}

impl RuntimeLogger {
    /// 创建一个新的 RuntimeLogger
    ///
    /// - `log_dir`: 日志文件存放目录
    /// - `file_prefix`: 文件前缀，例如 "runtime"（最终文件名形如 runtime_info.json.2024-05-01-10）
    /// - `buffer_size`: mpsc 通道缓冲区大小
    /// - `batch_size`: 每个日志级别批量写入的日志条数
    /// - `flush_interval`: 定时刷新日志的时间间隔（毫秒）
    /// - `retention_hours`: 日志保留时长，超过的文件会被后台任务删除
    pub fn new(
        log_dir: impl AsRef<Path>,
        file_prefix: &str,
        buffer_size: usize,
        batch_size: usize,
        flush_interval: u64,
        retention_hours: u64,
    ) -> Arc<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let mut log_files = HashMap::new();
        for level in LEVELS {
            let file_name = format!("{}_{}.json", file_prefix, level.to_lowercase());
            let appender = rolling::hourly(&log_dir, &file_name);
            log_files.insert(level.to_string(), Arc::new(appender));
        }
        let logger = Arc::new(Self { sender, log_dir: log_dir.clone() });
        tokio::spawn(Self::background_log_writer(
            log_files,
            receiver,
            batch_size.max(1),
            flush_interval.max(1),
        ));
        // 启动后台任务定期清理日志文件
        tokio::spawn(async move {
            let cleanup_interval = Duration::from_secs(3600); // 每小时扫描一次
            loop {
                Self::cleanup_old_logs(&log_dir, retention_hours).await;
                tokio::time::sleep(cleanup_interval).await;
            }
        });
        logger
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// 记录运行日志，接受两个参数：level 和 message
    pub async fn log(&self, level: &str, message: &str) {
        let log_entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "message": message
        })
        .to_string();
        self.send(level, log_entry).await;
    }

    /// 记录一条会话日志，失败和超时写入 WARN 文件
    pub async fn log_session(&self, session_log: &SessionLog) {
        let level = if session_log.status == "loaded" { "INFO" } else { "WARN" };
        match serde_json::to_string(session_log) {
            Ok(content) => self.send(level, content).await,
            Err(e) => eprintln!("Failed to serialize session log: {}", e),
        }
    }

    async fn send(&self, level: &str, content: String) {
        let level = level.to_uppercase();
        let level = if LEVELS.contains(&level.as_str()) { level } else { "INFO".to_string() };
        let entry = LogEntry { level, content };
        if let Err(e) = self.sender.send(LogCommand::Entry(entry)).await {
            eprintln!("Failed to send runtime log message: {}", e);
        }
    }

    /// 后台日志写入任务
    async fn background_log_writer(
        log_files: HashMap<String, Arc<RollingFileAppender>>,
        mut receiver: Receiver<LogCommand>,
        batch_size: usize,
        flush_interval: u64,
    ) {
        // 每个日志级别独立的缓冲区
        let mut buffers: HashMap<String, Vec<String>> = HashMap::new();
        for level in log_files.keys() {
            buffers.insert(level.clone(), Vec::new());
        }
        let mut interval = time::interval(Duration::from_millis(flush_interval));
        loop {
            tokio::select! {
                command = receiver.recv() => {
                    match command {
                        Some(LogCommand::Entry(entry)) => {
                            let buffer = buffers.entry(entry.level.clone()).or_default();
                            buffer.push(entry.content);
                            if buffer.len() >= batch_size {
                                if let Some(appender) = log_files.get(&entry.level) {
                                    Self::write_logs_to_disk(appender.clone(), buffer).await;
                                }
                                buffer.clear();
                            }
                        }
                        Some(LogCommand::Flush(ack)) => {
                            Self::flush_all(&log_files, &mut buffers).await;
                            let _ = ack.send(());
                        }
                        None => {
                            // 所有发送端已关闭
                            Self::flush_all(&log_files, &mut buffers).await;
                            break;
                        }
                    }
                },
                _ = interval.tick() => {
                    Self::flush_all(&log_files, &mut buffers).await;
                }
            }
        }
    }

    async fn flush_all(
        log_files: &HashMap<String, Arc<RollingFileAppender>>,
        buffers: &mut HashMap<String, Vec<String>>,
    ) {
        for (level, buffer) in buffers.iter_mut() {
            if !buffer.is_empty() {
                if let Some(appender) = log_files.get(level) {
                    Self::write_logs_to_disk(appender.clone(), buffer).await;
                }
                buffer.clear();
            }
        }
    }

    async fn write_logs_to_disk(file: Arc<RollingFileAppender>, buffer: &[String]) {
        let content = buffer.join("\n") + "\n";
        let result = task::spawn_blocking(move || {
            let mut writer = file.make_writer();
            writer.write_all(content.as_bytes())
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("Failed to write runtime logs: {}", e),
            Err(e) => eprintln!("Runtime log writer task failed: {}", e),
        }
    }

    async fn cleanup_old_logs(log_dir: &Path, retention_hours: u64) {
        use std::time::{SystemTime, Duration as StdDuration};
        let retention_duration = StdDuration::from_secs(retention_hours * 3600);
        let now = SystemTime::now();
        match tokio::fs::read_dir(log_dir).await {
            Ok(mut dir) => {
                while let Ok(Some(entry)) = dir.next_entry().await {
                    let path = entry.path();
                    if let Ok(metadata) = entry.metadata().await {
                        if let Ok(modified) = metadata.modified() {
                            if now.duration_since(modified).unwrap_or_default() > retention_duration {
                                if let Err(e) = tokio::fs::remove_file(&path).await {
                                    eprintln!("Failed to delete old log file {:?}: {}", path, e);
                                }
                            }
                        }
                    }
                }
            },
            Err(e) => {
                eprintln!("Failed to read log directory {:?}: {}", log_dir, e);
            }
        }
    }

    /// 把缓冲中的日志全部写盘后返回
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(LogCommand::Flush(ack)).await.is_err() {
            return;
        }
        let _ = done.await;
    }
}
