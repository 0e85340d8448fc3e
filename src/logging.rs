use log::LevelFilter;

pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // async_imap is chatty at debug level
        .level_for("async_imap", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()
}
