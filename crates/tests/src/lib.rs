//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 典型场景测试（单 sink、多 sink、提前结束、错误镜像）
//! - 扇出性质测试
//! - 配置 -> 文件 tee 的 e2e 测试

#[cfg(test)]
mod contract_tests {
    use contracts::{Chunk, Encoding, ForkOptions, SinkError};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let options = ForkOptions::default();
        assert!(options.pass_error);
        assert_eq!(Chunk::from("x").encoding(), Encoding::Utf8);
    }

    #[test]
    fn test_not_writable_message() {
        assert_eq!(
            SinkError::not_writable("a").to_string(),
            "stream not writable"
        );
    }
}

#[cfg(test)]
mod tee_tests {
    use std::time::Duration;

    use contracts::{Chunk, ForkOptions, SinkError, SinkSignal, StreamError};
    use fork::{channel, Fork, MemorySink, SinkHandle, Termination};
    use futures::StreamExt;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// 单 sink 累积文本，下游收到相同文本
    #[tokio::test]
    async fn test_single_sink_accumulates_text() {
        let sink = MemorySink::new("dest");
        let probe = sink.probe();

        let mut fork = Fork::new(vec![SinkHandle::spawn(sink, 4)], ForkOptions::default());
        let (writer, upstream) = channel(4);
        fork.pipe_from(upstream).unwrap();
        let downstream = fork.pipe_to();
        let handle = fork.spawn();

        writer.write("abc\n").await.unwrap();
        writer.write("def").await.unwrap();
        writer.end();

        let forwarded: Vec<Chunk> = tokio::time::timeout(TIMEOUT, downstream.collect())
            .await
            .expect("downstream timed out");
        let report = handle.await.unwrap();

        let text: String = forwarded.iter().filter_map(Chunk::as_str).collect();
        assert_eq!(text, "abc\ndef");
        assert_eq!(probe.text(), "abc\ndef");
        assert_eq!(report.termination, Termination::Finished);
    }

    /// 三个 sink 以递增延迟异步 flush，下游数据完整
    #[tokio::test]
    async fn test_three_sinks_flush_with_increasing_delay() {
        let sinks: Vec<MemorySink> = (1..=3u64)
            .map(|i| {
                MemorySink::new(format!("sink{i}")).with_flush_delay(Duration::from_millis(15 * i))
            })
            .collect();
        let probes: Vec<_> = sinks.iter().map(MemorySink::probe).collect();
        let handles = sinks.into_iter().map(|s| SinkHandle::spawn(s, 4)).collect();

        let mut fork = Fork::new(handles, ForkOptions::default());
        let (writer, upstream) = channel(4);
        fork.pipe_from(upstream).unwrap();
        let downstream = fork.pipe_to();
        let handle = fork.spawn();

        let input: Vec<String> = (0..10).map(|i| format!("line {i}\n")).collect();
        for line in &input {
            writer.write(Chunk::text(line.clone())).await.unwrap();
        }
        drop(writer);

        let forwarded: Vec<Chunk> = tokio::time::timeout(TIMEOUT, downstream.collect())
            .await
            .expect("downstream timed out");
        tokio::time::timeout(TIMEOUT, handle)
            .await
            .expect("fork timed out")
            .unwrap();

        let text: String = forwarded.iter().filter_map(Chunk::as_str).collect();
        assert_eq!(text, input.concat());

        // 所有 sink 都已 flush；完成顺序与 flush 延迟一致
        let finished: Vec<_> = probes
            .iter()
            .map(|p| p.finished_at().expect("sink was not flushed"))
            .collect();
        assert!(finished[0] < finished[1]);
        assert!(finished[1] < finished[2]);
        for probe in &probes {
            assert_eq!(probe.text(), input.concat());
            assert!(probe.is_closed());
        }
    }

    /// 一个 sink 收到 3 个 chunk 后自行结束，之后的写入记为 not writable
    #[tokio::test]
    async fn test_sink_ending_early_records_not_writable() {
        let early = MemorySink::new("early").end_after(3);
        let early_probe = early.probe();
        let steady = MemorySink::new("steady");
        let steady_probe = steady.probe();
        let early = SinkHandle::spawn(early, 4);
        let early_handle = early.clone();

        let mut fork = Fork::new(
            vec![early, SinkHandle::spawn(steady, 4)],
            ForkOptions::default(),
        );
        let mut outcomes = fork.outcomes();
        let (writer, upstream) = channel(4);
        fork.pipe_from(upstream).unwrap();
        let downstream = fork.pipe_to();
        let handle = fork.spawn();

        let feeder = tokio::spawn(async move {
            for i in 0..6 {
                writer.write(Chunk::text(format!("{i}"))).await.unwrap();
            }
        });

        let forwarded: Vec<Chunk> = tokio::time::timeout(TIMEOUT, downstream.collect())
            .await
            .expect("downstream timed out");
        feeder.await.unwrap();
        let report = handle.await.unwrap();

        assert_eq!(forwarded.len(), 6);
        assert_eq!(early_probe.text(), "012");
        assert_eq!(steady_probe.text(), "012345");

        assert_eq!(
            report.outcomes.get(0),
            Some(&SinkError::not_writable("early"))
        );
        assert_eq!(report.outcomes.get(1), None);
        assert_eq!(report.sinks[0].1.not_writable_count, 3);
        assert_eq!(*outcomes.borrow_and_update(), report.outcomes);

        // 自行结束的 sink 不会被第二次结束
        assert!(early_probe.is_flushed());
        assert!(!early_handle.end().await);
    }

    /// 上游报错，fork 自身与所有 sink 都收到同样的错误信息
    #[tokio::test]
    async fn test_upstream_error_reaches_fork_and_sinks() {
        let sinks: Vec<MemorySink> = (0..3).map(|i| MemorySink::new(format!("s{i}"))).collect();
        let probes: Vec<_> = sinks.iter().map(MemorySink::probe).collect();
        let handles = sinks.into_iter().map(|s| SinkHandle::spawn(s, 4)).collect();

        let mut fork = Fork::new(handles, ForkOptions::default());
        let mut listener = fork.errors().subscribe();
        let (writer, upstream) = channel(4);
        fork.pipe_from(upstream).unwrap();
        let handle = fork.spawn();

        writer.emit_error(StreamError::new("bam")).unwrap();
        let err = tokio::time::timeout(TIMEOUT, listener.recv())
            .await
            .expect("no error observed")
            .unwrap();
        drop(writer);
        handle.await.unwrap();

        assert_eq!(err.message(), "bam");
        for probe in &probes {
            let errors = probe.errors();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].message(), "bam");
            // error 之后仍然正常收尾
            assert!(probe.signals().ends_with(&[SinkSignal::End, SinkSignal::Close]));
        }
    }
}

#[cfg(test)]
mod property_tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use contracts::{Chunk, ChunkSink, ContractError, ForkOptions, SinkSignal, StreamError};
    use fork::{channel, Fork, MemorySink, SinkHandle};
    use futures::StreamExt;

    /// 生成确定性的二进制 chunk 序列
    fn binary_chunks(count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| {
                let len = 1 + (i * 37) % 200;
                let data: Vec<u8> = (0..len).map(|j| ((i * 31 + j * 7) % 256) as u8).collect();
                Chunk::new(Bytes::from(data))
            })
            .collect()
    }

    async fn run_through(sink_count: usize, input: Vec<Chunk>) -> (Vec<Chunk>, Vec<Vec<Chunk>>) {
        let sinks: Vec<MemorySink> = (0..sink_count)
            .map(|i| MemorySink::new(format!("sink{i}")))
            .collect();
        let probes: Vec<_> = sinks.iter().map(MemorySink::probe).collect();
        let handles = sinks.into_iter().map(|s| SinkHandle::spawn(s, 2)).collect();

        let mut fork = Fork::new(handles, ForkOptions::default());
        let (writer, upstream) = channel(2);
        fork.pipe_from(upstream).unwrap();
        let downstream = fork.pipe_to();
        let handle = fork.spawn();

        let feeder = tokio::spawn(async move {
            for chunk in input {
                writer.write(chunk).await.unwrap();
            }
        });

        let forwarded: Vec<Chunk> = downstream.collect().await;
        feeder.await.unwrap();
        handle.await.unwrap();

        (forwarded, probes.iter().map(|p| p.chunks()).collect())
    }

    /// 扇出完整性：每个可写 sink 按顺序收到每个 chunk 恰好一次
    #[tokio::test]
    async fn test_fan_out_completeness() {
        let input = binary_chunks(50);
        let (_, received) = run_through(4, input.clone()).await;

        assert_eq!(received.len(), 4);
        for chunks in received {
            assert_eq!(chunks, input);
        }
    }

    /// 透传保真：下游收到的序列与上游完全一致，与 sink 数量无关
    #[tokio::test]
    async fn test_pass_through_fidelity() {
        let input = binary_chunks(40);
        for sink_count in [0, 1, 5] {
            let (forwarded, _) = run_through(sink_count, input.clone()).await;
            assert_eq!(forwarded, input, "sink_count = {sink_count}");
        }
    }

    /// 写入开始时检查上一个 chunk 的所有写入是否已完成
    struct GateSink {
        name: String,
        sinks: usize,
        delay: Duration,
        completed: Arc<AtomicUsize>,
        violations: Arc<AtomicUsize>,
    }

    impl ChunkSink for GateSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
            let index: usize = chunk
                .as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ContractError::sink_write(&self.name, "bad chunk"))?;
            if self.completed.load(Ordering::SeqCst) < index * self.sinks {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// 屏障：chunk K 的写入全部结束前，chunk K+1 不会写入任何 sink
    #[tokio::test]
    async fn test_barrier_property() {
        let completed = Arc::new(AtomicUsize::new(0));
        let violations = Arc::new(AtomicUsize::new(0));
        let sink_count = 3;
        let handles = (0..sink_count)
            .map(|i| {
                SinkHandle::spawn(
                    GateSink {
                        name: format!("gate{i}"),
                        sinks: sink_count,
                        delay: Duration::from_millis(2 + 3 * i as u64),
                        completed: Arc::clone(&completed),
                        violations: Arc::clone(&violations),
                    },
                    8,
                )
            })
            .collect();

        let mut fork = Fork::new(handles, ForkOptions::default());
        let (writer, upstream) = channel(8);
        fork.pipe_from(upstream).unwrap();
        let handle = fork.spawn();

        for i in 0..10 {
            writer.write(Chunk::text(i.to_string())).await.unwrap();
        }
        drop(writer);
        let report = handle.await.unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 10 * sink_count);
        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert!(!report.outcomes.has_failures());
    }

    /// 统计 flush/close 次数的 sink
    struct CountingSink {
        name: String,
        flushes: Arc<AtomicU64>,
        closes: Arc<AtomicU64>,
        ends: Arc<AtomicU64>,
    }

    impl ChunkSink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _chunk: &Chunk) -> Result<(), ContractError> {
            Ok(())
        }

        fn on_signal(&mut self, signal: &SinkSignal) {
            if *signal == SinkSignal::End {
                self.ends.fetch_add(1, Ordering::SeqCst);
            }
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// 结束镜像：上游结束时每个 sink 恰好收尾一次，即便调用方提前结束过它
    #[tokio::test]
    async fn test_termination_mirrored_exactly_once() {
        let flushes = Arc::new(AtomicU64::new(0));
        let closes = Arc::new(AtomicU64::new(0));
        let ends = Arc::new(AtomicU64::new(0));
        let handles: Vec<SinkHandle> = (0..3)
            .map(|i| {
                SinkHandle::spawn(
                    CountingSink {
                        name: format!("count{i}"),
                        flushes: Arc::clone(&flushes),
                        closes: Arc::clone(&closes),
                        ends: Arc::clone(&ends),
                    },
                    4,
                )
            })
            .collect();
        let shared = handles[0].clone();

        let mut fork = Fork::new(handles, ForkOptions::default());
        let (writer, upstream) = channel(4);
        fork.pipe_from(upstream).unwrap();
        let handle = fork.spawn();

        writer.write("a").await.unwrap();
        // 调用方持有同一个 sink，先行结束它
        assert!(shared.end().await);
        shared.finished().await;
        writer.write("b").await.unwrap();
        drop(writer);

        let report = handle.await.unwrap();

        assert_eq!(flushes.load(Ordering::SeqCst), 3);
        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert_eq!(ends.load(Ordering::SeqCst), 3);
        assert!(report.outcomes.get(0).is_some_and(|e| e.is_not_writable()));
    }

    /// passError=false：上游错误不会被 fork 捕获
    #[tokio::test]
    async fn test_pass_error_disabled() {
        let sink = MemorySink::new("quiet");
        let probe = sink.probe();
        let mut fork = Fork::new(
            vec![SinkHandle::spawn(sink, 4)],
            ForkOptions::without_pass_error(),
        );
        let mut listener = fork.errors().subscribe();
        let (writer, upstream) = channel(4);
        fork.pipe_from(upstream).unwrap();
        let handle = fork.spawn();

        let unhandled = writer
            .emit_error(StreamError::new("bam"))
            .expect_err("nobody should be listening");
        assert_eq!(unhandled.into_inner().message(), "bam");

        writer.write("still flowing").await.unwrap();
        drop(writer);
        let report = handle.await.unwrap();

        assert!(listener.try_recv().is_err());
        assert!(probe.errors().is_empty());
        assert_eq!(report.chunks, 1);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::Chunk;
    use fork::{channel, create_fork, Termination};
    use futures::StreamExt;

    /// End-to-end test: TOML 配置 -> create_fork -> 文件 sinks
    #[tokio::test]
    async fn test_config_driven_file_tee() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("nested/second.txt");

        let content = format!(
            r#"
[fork]
high_water_mark = 2

[[sinks]]
name = "first"
sink_type = "file"
[sinks.params]
path = "{}"

[[sinks]]
name = "second"
sink_type = "file"
queue_capacity = 1
[sinks.params]
path = "{}"

[[sinks]]
name = "log"
sink_type = "log"
"#,
            first.display(),
            second.display()
        );
        let config = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();

        let mut fork = create_fork(config.sinks, config.fork).await.unwrap();
        let (writer, upstream) = channel(2);
        fork.pipe_from(upstream).unwrap();
        let downstream = fork.pipe_to();
        let handle = fork.spawn();

        let lines: Vec<String> = (0..100).map(|i| format!("record {i}\n")).collect();
        let expected = lines.concat();
        let feeder = tokio::spawn(async move {
            for line in lines {
                writer.write(Chunk::text(line)).await.unwrap();
            }
        });

        let forwarded: Vec<Chunk> =
            tokio::time::timeout(Duration::from_secs(5), downstream.collect())
                .await
                .expect("downstream timed out");
        feeder.await.unwrap();
        let report = handle.await.unwrap();

        let text: String = forwarded.iter().filter_map(Chunk::as_str).collect();
        assert_eq!(text, expected);
        assert_eq!(report.termination, Termination::Finished);
        assert_eq!(report.sinks.len(), 3);
        assert!(!report.outcomes.has_failures());
        assert_eq!(std::fs::read_to_string(&first).unwrap(), expected);
        assert_eq!(std::fs::read_to_string(&second).unwrap(), expected);
    }
}
