use redox_log::{OutputBuilder, RedoxLogger};

/// Configures logging for a command-line tool: everything at or above `output_level` goes to
/// stderr.
pub fn setup_logging(name: &str, output_level: log::LevelFilter) -> Option<&'static RedoxLogger> {
    let logger = RedoxLogger::new().with_output(
        OutputBuilder::stderr()
            .with_filter(output_level)
            .with_ansi_escape_codes()
            .flush_on_newline(true)
            .build(),
    );

    match logger.enable() {
        Ok(logger_ref) => {
            log::debug!("{}: enabled logger", name);
            Some(logger_ref)
        }
        Err(error) => {
            eprintln!("{}: failed to set default logger: {}", name, error);
            None
        }
    }
}
