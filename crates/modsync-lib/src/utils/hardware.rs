use std::thread;

/// Number of processing units available to this process, never less than 1
pub fn processing_units() -> usize {
    match thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            log::debug!("Could not query available parallelism ({}), using 1", e);
            1
        }
    }
}
