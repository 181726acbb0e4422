/// Environment variable overriding the parse worker count
pub const WORKERS_ENV: &str = "SIGSCOPE_SCAN_WORKERS";

const MAX_SCAN_WORKERS: usize = 32;

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn tier_for(file_count: usize) -> usize {
    if file_count <= 64 {
        2
    } else if file_count <= 256 {
        4
    } else {
        8
    }
}

fn default_workers(file_count: usize, cpus: usize) -> usize {
    tier_for(file_count).min(cpus).max(1)
}

fn parse_worker_override(raw: Option<&str>) -> Option<usize> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .map(|n| n.clamp(1, MAX_SCAN_WORKERS))
}

fn workers_from_env() -> Option<usize> {
    let raw = std::env::var(WORKERS_ENV).ok();
    parse_worker_override(raw.as_deref())
}

/// Number of parse workers for `file_count` files.
///
/// An explicit request wins over the environment, which wins over the CPU/file-count tiers.
/// The result never exceeds the number of files, so every worker gets a non-empty chunk.
pub(crate) fn resolve_workers(file_count: usize, requested: Option<usize>) -> usize {
    let workers = requested
        .map(|n| n.clamp(1, MAX_SCAN_WORKERS))
        .or_else(workers_from_env)
        .unwrap_or_else(|| default_workers(file_count, available_cpus()));
    workers.min(file_count).max(1)
}
