use std::{fmt, rc::Rc};

/// 宿主程序提供的日志输出
pub trait LogSink {
    fn log(&self, level: log::Level, args: &fmt::Arguments<'_>);
}

/// 转发到 `log` crate 的 sink，宿主程序自己安装 logger
pub struct LogCrateSink {
    target: String,
}

impl LogCrateSink {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into() }
    }
}

impl Default for LogCrateSink {
    fn default() -> Self {
        Self::new("truvis_embed")
    }
}

impl LogSink for LogCrateSink {
    fn log(&self, level: log::Level, args: &fmt::Arguments<'_>) {
        log::log!(target: &self.target, level, "{}", args);
    }
}

/// 每个渲染上下文持有的日志上下文
///
/// 给所有消息加上前缀，并按等级过滤
pub struct LogContext {
    sink: Rc<dyn LogSink>,
    prefix: String,
    max_level: log::LevelFilter,
}

// 创建与销毁
impl LogContext {
    pub fn new(sink: Rc<dyn LogSink>, prefix: impl Into<String>, max_level: log::LevelFilter) -> Self {
        let log_ctx = Self {
            sink,
            prefix: prefix.into(),
            max_level,
        };
        log_ctx.debug(format_args!("log context created"));
        log_ctx
    }

    pub fn destroy(self) {
        self.info(format_args!("log context destroyed"));
    }
}

impl LogContext {
    pub fn log(&self, level: log::Level, args: fmt::Arguments<'_>) {
        if level > self.max_level {
            return;
        }
        self.sink.log(level, &format_args!("[{}] {}", self.prefix, args));
    }

    #[inline]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(log::Level::Error, args);
    }

    #[inline]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(log::Level::Warn, args);
    }

    #[inline]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(log::Level::Info, args);
    }

    #[inline]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(log::Level::Debug, args);
    }

    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct VecSink {
        lines: RefCell<Vec<(log::Level, String)>>,
    }

    impl LogSink for VecSink {
        fn log(&self, level: log::Level, args: &fmt::Arguments<'_>) {
            self.lines.borrow_mut().push((level, args.to_string()));
        }
    }

    #[test]
    fn test_prefix_and_filter() {
        let sink = Rc::new(VecSink::default());
        let log_ctx = LogContext::new(sink.clone(), "embed", log::LevelFilter::Info);

        log_ctx.debug(format_args!("hidden"));
        log_ctx.warn(format_args!("queue family {} has no graphics", 3));
        log_ctx.destroy();

        let lines = sink.lines.borrow();
        assert_eq!(
            *lines,
            vec![
                (log::Level::Warn, "[embed] queue family 3 has no graphics".to_string()),
                (log::Level::Info, "[embed] log context destroyed".to_string()),
            ]
        );
    }
}
