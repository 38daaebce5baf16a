//! Dependency & priority scheduler.
//!
//! Grounded in the pack's `planner::DagPlanner` (topological execution
//! over a dependency graph, `roots`/`dependents` maps, `JoinSet`-based
//! bounded concurrency via `Semaphore`), re-targeted from *steps-within-a-
//! suite* to *suites-within-a-run*. Cycle detection reuses the same
//! colour-mark `validation::detect_cycle_dfs` DFS, generalized to drop only
//! the offending back-edge per cycle instead of rejecting the whole plan.

use crate::collaborators::{DiscoveredSuite, SuiteSource};
use crate::context::GlobalRegistry;
use crate::executor::SuiteExecutor;
use crate::limits::ExecutionLimits;
use crate::model::{DependencyResult, ExecutionReport, ExecutionSummary, Priority, SuiteResult, SuiteStatus};
use crate::observer::{ExecutionStats, Observer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Topological order plus the cycle/missing-dependency warnings produced
/// while computing it.
pub struct SchedulerOrder {
    pub order: Vec<usize>,
    pub warnings: Vec<String>,
    pub effective_deps: Vec<Vec<usize>>,
}

/// Computes the execution order over `suites` by `depends`, tie-broken by
/// priority weight (desc), estimated duration (asc, unknown last), then
/// discovery index (asc). Missing dependencies are dropped with a warning;
/// cycles are broken by dropping the back-edge DFS finds, also warned.
pub fn compute_order(suites: &[DiscoveredSuite]) -> SchedulerOrder {
    let id_index: HashMap<&str, usize> = suites
        .iter()
        .enumerate()
        .map(|(i, s)| (s.node_id.as_str(), i))
        .collect();

    let mut warnings = Vec::new();
    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); suites.len()];
    for (i, s) in suites.iter().enumerate() {
        for d in &s.depends {
            match id_index.get(d.as_str()) {
                Some(&di) => deps[i].push(di),
                None => warnings.push(crate::collaborators::source::unknown_dependency_warning(
                    &s.node_id, d,
                )),
            }
        }
    }

    // 0 = white (unvisited), 1 = gray (on the current DFS path), 2 = black (done).
    let mut color = vec![0u8; suites.len()];
    let mut effective = deps.clone();
    for i in 0..suites.len() {
        if color[i] == 0 {
            break_cycles(i, &deps, &mut color, &mut effective, &mut warnings, suites);
        }
    }

    let mut indegree: Vec<usize> = effective.iter().map(|d| d.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); suites.len()];
    for (node, deps_of_node) in effective.iter().enumerate() {
        for &dep in deps_of_node {
            dependents[dep].push(node);
        }
    }

    let mut ready: Vec<usize> = (0..suites.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(suites.len());

    while !ready.is_empty() {
        // Stable selection: priority desc, duration asc (unknown last), discovery index asc.
        let (best_pos, _) = ready
            .iter()
            .enumerate()
            .min_by(|(_, &a), (_, &b)| tie_break_key(suites, a).cmp(&tie_break_key(suites, b)))
            .unwrap();
        let picked = ready.remove(best_pos);
        order.push(picked);
        for &dependent in &dependents[picked] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    SchedulerOrder {
        order,
        warnings,
        effective_deps: effective,
    }
}

fn tie_break_key(suites: &[DiscoveredSuite], idx: usize) -> (std::cmp::Reverse<u8>, u64, usize) {
    let s = &suites[idx];
    (
        std::cmp::Reverse(s.priority.weight()),
        s.estimated_duration_ms.unwrap_or(u64::MAX),
        s.discovery_index,
    )
}

fn break_cycles(
    node: usize,
    deps: &[Vec<usize>],
    color: &mut [u8],
    effective: &mut [Vec<usize>],
    warnings: &mut Vec<String>,
    suites: &[DiscoveredSuite],
) {
    color[node] = 1;
    for &dep in &deps[node] {
        match color[dep] {
            1 => {
                effective[node].retain(|&d| d != dep);
                warnings.push(format!(
                    "[{}] dependency cycle detected: '{}' -> '{}'; edge dropped",
                    crate::errors::ErrorCode::CYCLE_DETECTED,
                    suites[node].node_id,
                    suites[dep].node_id
                ));
            }
            0 => break_cycles(dep, deps, color, effective, warnings, suites),
            _ => {}
        }
    }
    color[node] = 2;
}

/// A suite is required iff its priority is critical/high, unless its
/// `metadata.required` override says otherwise.
pub fn is_required(priority: Priority, required_override: Option<bool>) -> bool {
    required_override.unwrap_or_else(|| priority.is_required_by_default())
}

/// In-memory cache keyed by `(node_id, content_hash)`, restoring a
/// successful suite's exports on a cache hit instead of re-running it
/// for caching resolved suite results.
#[derive(Default)]
pub struct ResultCache {
    entries: HashMap<(String, String), SuiteResult>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_id: &str, content_hash: &str) -> Option<&SuiteResult> {
        self.entries.get(&(node_id.to_string(), content_hash.to_string()))
    }

    pub fn put(&mut self, node_id: &str, content_hash: &str, result: SuiteResult) {
        self.entries
            .insert((node_id.to_string(), content_hash.to_string()), result);
    }
}

pub struct Scheduler {
    pub limits: ExecutionLimits,
    pub observer: Arc<dyn Observer>,
    pub max_parallel_suites: usize,
    pub parallel: bool,
}

impl Scheduler {
    pub fn new(limits: ExecutionLimits, observer: Arc<dyn Observer>) -> Self {
        let max_parallel_suites = limits.max_parallel_suites;
        Self {
            limits,
            observer,
            max_parallel_suites,
            parallel: false,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Runs every discovered suite to completion, honoring dependency order,
    /// priority tie-breaks, the required-failure halt policy, and the
    /// result cache. Forces sequential mode whenever any discovered suite
    /// has an interactive input step.
    pub async fn execute(
        &self,
        discovered: Vec<DiscoveredSuite>,
        source: Arc<dyn SuiteSource>,
        executor: Arc<SuiteExecutor>,
        registry: Arc<Mutex<GlobalRegistry>>,
        cancel: CancellationToken,
    ) -> ExecutionReport {
        let start = Instant::now();
        self.observer.on_execution_start(&ExecutionStats {
            total_suites: discovered.len(),
        });
        for s in &discovered {
            self.observer.on_test_discovered(s);
        }

        let has_input = discovered.iter().any(|s| s.has_input_step);
        let order = compute_order(&discovered);
        for w in &order.warnings {
            tracing::warn!("{}", w);
            self.observer.on_error(w);
        }

        let report = if self.parallel && !has_input {
            self.execute_parallel(discovered, order, source, executor, registry, cancel).await
        } else {
            self.execute_sequential(discovered, order, source, executor, registry, cancel).await
        };

        let summary = ExecutionSummary {
            total_suites: report.len(),
            resolved: report.iter().filter(|r| r.status == SuiteStatus::Resolved).count(),
            failed: report.iter().filter(|r| r.status == SuiteStatus::Failed).count(),
            skipped: report.iter().filter(|r| r.status == SuiteStatus::Skipped).count(),
            total_duration_ms: start.elapsed().as_millis() as u64,
        };
        self.observer.on_execution_end(&summary);

        ExecutionReport {
            summary,
            suite_results: report,
        }
    }

    async fn execute_sequential(
        &self,
        discovered: Vec<DiscoveredSuite>,
        order: SchedulerOrder,
        source: Arc<dyn SuiteSource>,
        executor: Arc<SuiteExecutor>,
        registry: Arc<Mutex<GlobalRegistry>>,
        cancel: CancellationToken,
    ) -> Vec<SuiteResult> {
        let mut status: HashMap<String, SuiteStatus> = HashMap::new();
        let mut results = Vec::with_capacity(discovered.len());
        let mut cache = ResultCache::new();
        let mut halted_reason: Option<String> = None;

        for idx in order.order {
            let desc = &discovered[idx];

            if cancel.is_cancelled() {
                halted_reason.get_or_insert_with(|| "execution cancelled".to_string());
            }

            if let Some(reason) = &halted_reason {
                let result = skipped_result(desc, reason.clone(), &order, &discovered, &status);
                status.insert(desc.node_id.clone(), SuiteStatus::Skipped);
                results.push(result);
                continue;
            }

            if let Some(reason) = dependency_skip_reason(idx, &order.effective_deps, &discovered, &status) {
                let result = skipped_result(desc, reason, &order, &discovered, &status);
                status.insert(desc.node_id.clone(), SuiteStatus::Skipped);
                results.push(result);
                continue;
            }

            if let Some(cached) = cache.get(&desc.node_id, &desc.content_hash).cloned() {
                let mut replayed = cached;
                replayed.cached = true;
                replayed.duration_ms = 0;
                status.insert(desc.node_id.clone(), replayed.status);
                results.push(replayed);
                continue;
            }

            let suite = match source.load(&desc.node_id) {
                Ok(s) => s,
                Err(e) => {
                    let result = failed_result(desc, e.to_string(), &order, &discovered, &status);
                    status.insert(desc.node_id.clone(), SuiteStatus::Failed);
                    if is_required(desc.priority, None) {
                        halted_reason = Some(format!("required suite '{}' failed to load", desc.node_id));
                    }
                    results.push(result);
                    continue;
                }
            };
            let required = is_required(desc.priority, suite.metadata.as_ref().and_then(|m| m.required));

            let result = executor.run_suite(suite, Arc::clone(&registry)).await;
            status.insert(desc.node_id.clone(), result.status);
            if result.status == SuiteStatus::Resolved {
                cache.put(&desc.node_id, &desc.content_hash, result.clone());
            } else if result.status == SuiteStatus::Failed && required {
                halted_reason = Some(format!("required suite '{}' failed", desc.node_id));
            }
            results.push(result);
        }

        results
    }

    async fn execute_parallel(
        &self,
        discovered: Vec<DiscoveredSuite>,
        order: SchedulerOrder,
        source: Arc<dyn SuiteSource>,
        executor: Arc<SuiteExecutor>,
        registry: Arc<Mutex<GlobalRegistry>>,
        cancel: CancellationToken,
    ) -> Vec<SuiteResult> {
        let discovered = Arc::new(discovered);
        let effective_deps = Arc::new(order.effective_deps);
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); discovered.len()];
        for (node, deps) in effective_deps.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }
        let dependents = Arc::new(dependents);

        let semaphore = Arc::new(Semaphore::new(self.max_parallel_suites.max(1)));
        let status: Arc<RwLock<HashMap<usize, SuiteStatus>>> = Arc::new(RwLock::new(HashMap::new()));
        let results: Arc<Mutex<Vec<(usize, SuiteResult)>>> = Arc::new(Mutex::new(Vec::new()));
        let halted = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let cache: Arc<Mutex<ResultCache>> = Arc::new(Mutex::new(ResultCache::new()));

        let mut indegree: Vec<usize> = effective_deps.iter().map(|d| d.len()).collect();
        let mut pending: Vec<usize> = (0..discovered.len()).collect();
        let mut in_flight: JoinSet<(usize, SuiteResult)> = JoinSet::new();

        loop {
            if cancel.is_cancelled() {
                halted.store(true, std::sync::atomic::Ordering::SeqCst);
            }

            let ready: Vec<usize> = pending
                .iter()
                .copied()
                .filter(|&i| indegree[i] == 0)
                .collect();
            pending.retain(|i| indegree[*i] != 0);

            for idx in ready {
                let discovered = Arc::clone(&discovered);
                let effective_deps = Arc::clone(&effective_deps);
                let source = Arc::clone(&source);
                let executor = Arc::clone(&executor);
                let registry = Arc::clone(&registry);
                let semaphore = Arc::clone(&semaphore);
                let status = Arc::clone(&status);
                let halted = Arc::clone(&halted);
                let cache = Arc::clone(&cache);
                let order_warnings_empty: Vec<String> = Vec::new();

                in_flight.spawn(async move {
                    let _permit = semaphore.acquire().await.expect("semaphore closed");
                    let desc = &discovered[idx];

                    if halted.load(std::sync::atomic::Ordering::SeqCst) {
                        let snap = status.read().await.clone();
                        let fake_order = SchedulerOrder {
                            order: vec![],
                            warnings: order_warnings_empty,
                            effective_deps: (*effective_deps).clone(),
                        };
                        return (
                            idx,
                            skipped_result(desc, "execution halted".to_string(), &fake_order, &discovered, &status_map_by_id(&discovered, &snap)),
                        );
                    }

                    if let Some(reason) = dependency_skip_reason_idx(idx, &effective_deps, &discovered, &status.read().await) {
                        return (idx, skipped_result_simple(desc, reason));
                    }

                    if let Some(cached) = cache.lock().await.get(&desc.node_id, &desc.content_hash).cloned() {
                        let mut replayed = cached;
                        replayed.cached = true;
                        replayed.duration_ms = 0;
                        return (idx, replayed);
                    }

                    let suite = match source.load(&desc.node_id) {
                        Ok(s) => s,
                        Err(e) => return (idx, failed_result_simple(desc, e.to_string())),
                    };
                    let required = is_required(desc.priority, suite.metadata.as_ref().and_then(|m| m.required));
                    let result = executor.run_suite(suite, Arc::clone(&registry)).await;
                    if result.status == SuiteStatus::Resolved {
                        cache.lock().await.put(&desc.node_id, &desc.content_hash, result.clone());
                    } else if result.status == SuiteStatus::Failed && required {
                        halted.store(true, std::sync::atomic::Ordering::SeqCst);
                    }
                    (idx, result)
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            if let Ok((idx, result)) = joined {
                status.write().await.insert(idx, result.status);
                results.lock().await.push((idx, result));
                for &dependent in &dependents[idx] {
                    indegree[dependent] = indegree[dependent].saturating_sub(1);
                }
            }

            if pending.is_empty() && in_flight.is_empty() {
                break;
            }
        }

        let mut final_results = results.lock().await.clone();
        final_results.sort_by_key(|(idx, _)| *idx);
        final_results.into_iter().map(|(_, r)| r).collect()
    }
}

fn status_map_by_id(
    discovered: &[DiscoveredSuite],
    by_index: &HashMap<usize, SuiteStatus>,
) -> HashMap<String, SuiteStatus> {
    by_index
        .iter()
        .filter_map(|(idx, status)| discovered.get(*idx).map(|d| (d.node_id.clone(), *status)))
        .collect()
}

fn dependency_skip_reason(
    idx: usize,
    effective_deps: &[Vec<usize>],
    discovered: &[DiscoveredSuite],
    status: &HashMap<String, SuiteStatus>,
) -> Option<String> {
    for &dep_idx in &effective_deps[idx] {
        let dep_id = &discovered[dep_idx].node_id;
        match status.get(dep_id) {
            Some(SuiteStatus::Failed) | Some(SuiteStatus::Skipped) => {
                return Some(format!("dependency '{}' did not resolve", dep_id));
            }
            _ => {}
        }
    }
    None
}

fn dependency_skip_reason_idx(
    idx: usize,
    effective_deps: &[Vec<usize>],
    discovered: &[DiscoveredSuite],
    status: &HashMap<usize, SuiteStatus>,
) -> Option<String> {
    for &dep_idx in &effective_deps[idx] {
        match status.get(&dep_idx) {
            Some(SuiteStatus::Failed) | Some(SuiteStatus::Skipped) => {
                return Some(format!(
                    "dependency '{}' did not resolve",
                    discovered[dep_idx].node_id
                ));
            }
            _ => {}
        }
    }
    None
}

fn skipped_result(
    desc: &DiscoveredSuite,
    reason: String,
    order: &SchedulerOrder,
    discovered: &[DiscoveredSuite],
    status: &HashMap<String, SuiteStatus>,
) -> SuiteResult {
    let idx = discovered.iter().position(|d| d.node_id == desc.node_id).unwrap_or(0);
    let dependency_results = order
        .effective_deps
        .get(idx)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|dep_idx| DependencyResult {
            node_id: discovered[dep_idx].node_id.clone(),
            status: status
                .get(&discovered[dep_idx].node_id)
                .copied()
                .unwrap_or(SuiteStatus::Skipped),
        })
        .collect();
    SuiteResult {
        node_id: desc.node_id.clone(),
        suite_name: desc.suite_name.clone(),
        status: SuiteStatus::Skipped,
        cached: false,
        duration_ms: 0,
        step_results: Vec::new(),
        error_message: Some(reason),
        dependency_results,
    }
}

fn skipped_result_simple(desc: &DiscoveredSuite, reason: String) -> SuiteResult {
    SuiteResult {
        node_id: desc.node_id.clone(),
        suite_name: desc.suite_name.clone(),
        status: SuiteStatus::Skipped,
        cached: false,
        duration_ms: 0,
        step_results: Vec::new(),
        error_message: Some(reason),
        dependency_results: Vec::new(),
    }
}

fn failed_result(
    desc: &DiscoveredSuite,
    reason: String,
    _order: &SchedulerOrder,
    _discovered: &[DiscoveredSuite],
    _status: &HashMap<String, SuiteStatus>,
) -> SuiteResult {
    failed_result_simple(desc, reason)
}

fn failed_result_simple(desc: &DiscoveredSuite, reason: String) -> SuiteResult {
    SuiteResult {
        node_id: desc.node_id.clone(),
        suite_name: desc.suite_name.clone(),
        status: SuiteStatus::Failed,
        cached: false,
        duration_ms: 0,
        step_results: Vec::new(),
        error_message: Some(reason),
        dependency_results: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite(node_id: &str, priority: Priority, depends: &[&str], idx: usize) -> DiscoveredSuite {
        DiscoveredSuite {
            node_id: node_id.to_string(),
            suite_name: node_id.to_string(),
            priority,
            depends: depends.iter().map(|s| s.to_string()).collect(),
            estimated_duration_ms: None,
            discovery_index: idx,
            content_hash: format!("hash-{}", node_id),
            has_input_step: false,
        }
    }

    #[test]
    fn scenario_a_ordering_by_dependency_and_priority() {
        let suites = vec![
            suite("A", Priority::Medium, &[], 0),
            suite("B", Priority::Critical, &[], 1),
            suite("C", Priority::High, &["A"], 2),
            suite("D", Priority::Low, &["B"], 3),
        ];
        let order = compute_order(&suites);
        let ids: Vec<&str> = order.order.iter().map(|&i| suites[i].node_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "D", "C"]);
    }

    #[test]
    fn topological_order_holds_for_acyclic_graphs() {
        let suites = vec![
            suite("a", Priority::Medium, &[], 0),
            suite("b", Priority::Medium, &["a"], 1),
            suite("c", Priority::Medium, &["b"], 2),
        ];
        let order = compute_order(&suites);
        let pos: HashMap<&str, usize> = order
            .order
            .iter()
            .enumerate()
            .map(|(pos, &i)| (suites[i].node_id.as_str(), pos))
            .collect();
        assert!(pos["a"] < pos["b"]);
        assert!(pos["b"] < pos["c"]);
    }

    #[test]
    fn cyclic_dependency_drops_one_edge_and_warns() {
        let suites = vec![
            suite("a", Priority::Medium, &["c"], 0),
            suite("b", Priority::Medium, &["a"], 1),
            suite("c", Priority::Medium, &["b"], 2),
        ];
        let order = compute_order(&suites);
        assert_eq!(order.order.len(), 3);
        assert_eq!(order.warnings.len(), 1);
        assert!(order.warnings[0].contains("cycle"));
    }

    #[test]
    fn missing_dependency_is_dropped_with_warning() {
        let suites = vec![suite("a", Priority::Medium, &["ghost"], 0)];
        let order = compute_order(&suites);
        assert_eq!(order.order, vec![0]);
        assert_eq!(order.warnings.len(), 1);
        assert!(order.warnings[0].contains("ghost"));
    }

    #[test]
    fn required_by_priority_unless_overridden() {
        assert!(is_required(Priority::Critical, None));
        assert!(!is_required(Priority::Medium, None));
        assert!(is_required(Priority::Low, Some(true)));
        assert!(!is_required(Priority::Critical, Some(false)));
    }

    #[test]
    fn result_cache_round_trips() {
        let mut cache = ResultCache::new();
        let result = SuiteResult {
            node_id: "a".to_string(),
            suite_name: "A".to_string(),
            status: SuiteStatus::Resolved,
            cached: false,
            duration_ms: 10,
            step_results: vec![],
            error_message: None,
            dependency_results: vec![],
        };
        cache.put("a", "hash1", result.clone());
        assert!(cache.get("a", "hash1").is_some());
        assert!(cache.get("a", "hash2").is_none());
    }

    use crate::collaborators::certificate::NoopCertificateService;
    use crate::collaborators::http::{HttpError, HttpErrorKind, MockHttpClient};
    use crate::collaborators::input::DialoguerInputPrompter;
    use crate::collaborators::source::FileSuiteSource;
    use crate::faker::DefaultFakerProvider;
    use std::io::Write;

    fn write_suite(dir: &std::path::Path, file_name: &str, yaml: &str) {
        let mut f = std::fs::File::create(dir.join(file_name)).unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn scenario_f_required_suite_failure_halts_later_suites() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(
            dir.path(),
            "crit.yaml",
            "node_id: crit\n\
             suite_name: Critical\n\
             base_url: http://api.test\n\
             metadata:\n\
             \x20\x20priority: critical\n\
             steps:\n\
             \x20\x20- name: doomed\n\
             \x20\x20\x20\x20request:\n\
             \x20\x20\x20\x20\x20\x20method: GET\n\
             \x20\x20\x20\x20\x20\x20url: /doomed\n",
        );
        write_suite(
            dir.path(),
            "lo.yaml",
            "node_id: lo\n\
             suite_name: LowPriority\n\
             base_url: http://api.test\n\
             metadata:\n\
             \x20\x20priority: low\n\
             steps:\n\
             \x20\x20- name: noop\n\
             \x20\x20\x20\x20request:\n\
             \x20\x20\x20\x20\x20\x20method: GET\n\
             \x20\x20\x20\x20\x20\x20url: /noop\n",
        );

        let http = Arc::new(MockHttpClient::new());
        http.on_error(
            "GET",
            "http://api.test/doomed",
            HttpError {
                kind: HttpErrorKind::TransportCancelled,
                message: "simulated failure".to_string(),
            },
        );

        let source: Arc<dyn SuiteSource> = Arc::new(FileSuiteSource::new(dir.path()));
        let observer: Arc<dyn Observer> = Arc::new(crate::observer::NullObserver);
        let services = crate::executor::Services::from_env(
            Arc::clone(&source),
            http,
            Arc::new(DialoguerInputPrompter),
            Arc::new(NoopCertificateService),
            Arc::new(DefaultFakerProvider),
            Arc::clone(&observer),
            ExecutionLimits::default(),
            true,
            None,
        );
        let executor = Arc::new(SuiteExecutor::new(services));
        let discovered = source.discover().unwrap();
        let registry = Arc::new(Mutex::new(GlobalRegistry::new()));

        let scheduler = Scheduler::new(ExecutionLimits::default(), observer);
        let report = scheduler
            .execute(discovered, source, executor, registry, CancellationToken::new())
            .await;

        let crit = report.suite_results.iter().find(|r| r.node_id == "crit").unwrap();
        let lo = report.suite_results.iter().find(|r| r.node_id == "lo").unwrap();
        assert_eq!(crit.status, SuiteStatus::Failed);
        assert_eq!(lo.status, SuiteStatus::Skipped);
        assert!(
            lo.error_message.as_deref().unwrap_or_default().contains("crit"),
            "skip reason should attribute the halt to the required suite"
        );
    }
}
