use std::path::Path;

pub fn init(filepath: &Path, level: log::LevelFilter, verbose: bool) -> anyhow::Result<()> {
    if let Some(dir) = filepath.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Warn)
        .level_for("biblioteca_lib", level)
        .chain(fern::log_file(filepath)?);

    if verbose {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Warn)
                .level_for("biblioteca_lib", level)
                .chain(std::io::stderr()),
        );
    }

    dispatch.apply()?;
    Ok(())
}
