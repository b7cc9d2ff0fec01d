//! Worker runtime: the request loop, and map/reduce task execution. A
//! worker is a single OS process; nothing here is shared across workers,
//! so nothing here needs synchronization beyond whatever the user's
//! plugin itself introduces.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::seq::IndexedRandom;
use rayon::slice::ParallelSliceMut;
use tarpc::{client, context, tokio_serde::formats::Json};

use crate::mr::naming;
use crate::mr::plugin::Plugin;
use crate::mr::rpc::{Pair, ServerClient, TaskAssignment, TaskKind, TaskState, TaskUpdateRequest};

/// Sleep between retries after an RPC failure, and between "wait" polls.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

const ADJECTIVES: &[&str] = &[
    "Warty", "Hoary", "Breezy", "Dapper", "Edgy", "Feisty", "Gutsy", "Hardy", "Intrepid",
    "Jaunty", "Karmic", "Lucid", "Maverick", "Natty", "Oneiric", "Precise", "Quantal", "Raring",
    "Saucy", "Trusty", "Utopic", "Vivid", "Wily", "Xenial", "Yakkety", "Zesty",
];
const NOUNS: &[&str] = &[
    "Warthog", "Hedgehog", "Badger", "Drake", "Eft", "Fawn", "Gibbon", "Heron", "Ibex",
    "Jackalope", "Koala", "Lynx", "Meerkat", "Narwhal", "Ocelot", "Pangolin", "Quetzal",
    "Ringtail", "Salamander", "Tahr", "Unicorn", "Vervet", "Werewolf", "Xerus", "Yak", "Zapus",
];

/// A process-unique, human-readable worker identity: adjective-noun-pid.
/// Used only so the coordinator can tell whether a completion report
/// still comes from the worker holding the lease.
pub fn generate_identity() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).unwrap();
    let noun = NOUNS.choose(&mut rng).unwrap();
    format!("{adjective}{noun}_{}", std::process::id())
}

/// Dial a fresh connection to the coordinator's rendezvous socket. Calls
/// are not pooled: every RPC gets its own connection.
async fn connect(socket_path: &Path) -> anyhow::Result<ServerClient> {
    let transport = tarpc::serde_transport::unix::connect(socket_path, Json::default).await?;
    Ok(ServerClient::new(client::Config::default(), transport).spawn())
}

/// Run the worker's request loop forever (until the coordinator signals
/// completion or the process is killed). `plugin` supplies the user
/// map/reduce functions; `socket_path` is the coordinator's rendezvous
/// socket.
pub async fn run(socket_path: &Path, plugin: &dyn Plugin) -> anyhow::Result<()> {
    let identity = generate_identity();
    tracing::info!(worker = %identity, plugin = plugin.name(), "worker started");

    let temp_dir = temp_dir_for(&identity);
    std::fs::create_dir_all(&temp_dir)?;

    loop {
        let assignment = match request_task(socket_path, &identity).await {
            Ok(assignment) => assignment,
            Err(e) => {
                tracing::warn!(error = %e, "task_request call failed, retrying");
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
        };

        match assignment {
            TaskAssignment::Assigned {
                kind: TaskKind::Map,
                number,
                inputs,
                reduce_fanout,
            } => {
                let input = inputs
                    .first()
                    .expect("map task always carries exactly one input path");
                let outputs = execute_map(plugin, &temp_dir, number, input, reduce_fanout)?;
                report_completion(socket_path, TaskKind::Map, number, &identity, outputs).await;
            }
            TaskAssignment::Assigned {
                kind: TaskKind::Reduce,
                number,
                inputs,
                reduce_fanout,
            } => {
                let outputs = execute_reduce(plugin, number, &inputs, reduce_fanout)?;
                report_completion(socket_path, TaskKind::Reduce, number, &identity, outputs).await;
            }
            TaskAssignment::WaitMaps | TaskAssignment::WaitReduces => {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            TaskAssignment::AllDone => {
                tracing::info!("all tasks finished, exiting");
                return Ok(());
            }
            TaskAssignment::Error => {
                tracing::warn!("coordinator could not classify a task for us, retrying");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

async fn request_task(socket_path: &Path, identity: &str) -> anyhow::Result<TaskAssignment> {
    let client = connect(socket_path).await?;
    Ok(client
        .task_request(context::current(), identity.to_string())
        .await?)
}

/// Report a task's completion, retrying on call failure rather than
/// propagating it: the map/reduce output has already been computed by the
/// time this is called, and a transient dial/call failure (coordinator
/// briefly unreachable, socket busy) must not discard it by killing the
/// worker process (§4.2, §7 "RPC dial/call failure from worker").
async fn report_completion(
    socket_path: &Path,
    kind: TaskKind,
    number: usize,
    identity: &str,
    outputs: Vec<String>,
) {
    loop {
        match try_report_completion(socket_path, kind, number, identity, &outputs).await {
            Ok(reply) => {
                if reply.all_done {
                    tracing::info!("task_update reply signaled all work is done, exiting");
                    std::process::exit(0);
                }
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "task_update call failed, retrying");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

async fn try_report_completion(
    socket_path: &Path,
    kind: TaskKind,
    number: usize,
    identity: &str,
    outputs: &[String],
) -> anyhow::Result<crate::mr::rpc::TaskUpdateReply> {
    let client = connect(socket_path).await?;
    Ok(client
        .task_update(
            context::current(),
            TaskUpdateRequest {
                kind,
                number,
                worker: identity.to_string(),
                new_state: TaskState::Completed,
                outputs: outputs.to_vec(),
            },
        )
        .await?)
}

/// Read the input, apply `Map`, partition into `reduce_fanout` buckets by
/// `fnv1a_32(key) mod reduce_fanout`, and write one intermediate JSON
/// file per non-empty bucket into this worker's process-scoped temp
/// directory.
fn execute_map(
    plugin: &dyn Plugin,
    temp_dir: &Path,
    map_number: usize,
    input_path: &str,
    reduce_fanout: usize,
) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(input_path)?;
    let pairs = plugin.map(input_path, &contents);

    let mut buckets: Vec<Vec<Pair>> = vec![Vec::new(); reduce_fanout];
    for pair in pairs {
        let bucket = crate::mr::rpc::bucket_for_key(&pair.key, reduce_fanout);
        buckets[bucket].push(pair);
    }

    let mut output_paths = Vec::new();
    for (bucket, bucket_pairs) in buckets.into_iter().enumerate() {
        if bucket_pairs.is_empty() {
            continue;
        }
        let file_name = naming::intermediate_file_name(map_number, bucket);
        let path = temp_dir.join(&file_name);
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &bucket_pairs)?;
        output_paths.push(path.to_string_lossy().into_owned());
    }

    tracing::info!(
        map_number,
        files = output_paths.len(),
        "map task finished"
    );
    Ok(output_paths)
}

/// Decode every intermediate input file, sort by key (stable — ties keep
/// file-arrival order), invoke `Reduce` once per run of equal keys, and
/// write the single `mapreduce-out-*` file.
fn execute_reduce(
    plugin: &dyn Plugin,
    reduce_number: usize,
    input_paths: &[String],
    reduce_fanout: usize,
) -> anyhow::Result<Vec<String>> {
    let mut pairs: Vec<Pair> = Vec::new();
    for path in input_paths {
        let file = std::fs::File::open(path)?;
        let mut decoded: Vec<Pair> = serde_json::from_reader(file)?;
        pairs.append(&mut decoded);
    }

    // `rayon`'s sort is a stable merge sort: value order within a key
    // group is preserved, matching the user-function contract.
    pairs.par_sort_by(|a, b| a.key.cmp(&b.key));

    let output_name = naming::output_file_name(reduce_number, reduce_fanout);
    let mut output = String::new();

    let mut i = 0;
    while i < pairs.len() {
        let key = &pairs[i].key;
        let mut j = i;
        let mut values = Vec::new();
        while j < pairs.len() && &pairs[j].key == key {
            values.push(pairs[j].value.clone());
            j += 1;
        }
        let result = plugin.reduce(key, &values);
        output.push_str(key);
        output.push(' ');
        output.push_str(&result);
        output.push('\n');
        i = j;
    }

    std::fs::write(&output_name, output)?;
    tracing::info!(reduce_number, output = %output_name, "reduce task finished");
    Ok(vec![output_name])
}

/// The per-worker temp directory under `std::env::temp_dir()`.
pub fn temp_dir_for(identity: &str) -> PathBuf {
    std::env::temp_dir().join(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mr::plugins;
    use tempfile::tempdir;

    struct FixedPlugin;
    impl Plugin for FixedPlugin {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn map(&self, _filename: &str, contents: &str) -> Vec<Pair> {
            contents
                .split_whitespace()
                .map(|w| Pair::new(w, "1"))
                .collect()
        }
        fn reduce(&self, _key: &str, values: &[String]) -> String {
            values.len().to_string()
        }
    }

    #[test]
    fn generated_identities_are_distinct_in_practice() {
        let a = generate_identity();
        let b = generate_identity();
        // Not a hard guarantee (random collisions are possible), but
        // serves as a smoke test that the generator actually varies.
        assert_ne!(a, b, "expected two freshly generated identities to differ");
        assert!(a.ends_with(&std::process::id().to_string()));
    }

    #[test]
    fn map_writes_one_file_per_non_empty_bucket() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "foo bar foo").unwrap();

        let outputs = execute_map(
            &FixedPlugin,
            dir.path(),
            0,
            input.to_str().unwrap(),
            2,
        )
        .unwrap();

        for path in &outputs {
            let base = Path::new(path).file_name().unwrap().to_str().unwrap();
            assert!(base.starts_with("intermediate-M0-R"));
            assert!(base.ends_with(".json"));
        }
        let total_pairs: usize = outputs
            .iter()
            .map(|p| {
                let file = std::fs::File::open(p).unwrap();
                let decoded: Vec<Pair> = serde_json::from_reader(file).unwrap();
                decoded.len()
            })
            .sum();
        assert_eq!(total_pairs, 3);
    }

    #[test]
    fn map_with_no_pairs_writes_no_files() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("empty.txt");
        std::fs::write(&input, "").unwrap();

        let outputs =
            execute_map(&FixedPlugin, dir.path(), 0, input.to_str().unwrap(), 4).unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn reduce_groups_by_key_and_writes_expected_lines() {
        let dir = tempdir().unwrap();
        let intermediate = dir.path().join("intermediate-M0-R0.json");
        let pairs = vec![
            Pair::new("foo", "1"),
            Pair::new("bar", "1"),
            Pair::new("foo", "1"),
        ];
        let file = std::fs::File::create(&intermediate).unwrap();
        serde_json::to_writer(file, &pairs).unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let result = execute_reduce(
            &FixedPlugin,
            0,
            &[intermediate.to_str().unwrap().to_string()],
            1,
        );
        std::env::set_current_dir(original_dir).unwrap();
        let outputs = result.unwrap();

        assert_eq!(outputs, vec!["mapreduce-out-0-of-0"]);
        let written = std::fs::read_to_string(dir.path().join("mapreduce-out-0-of-0")).unwrap();
        let mut lines: Vec<&str> = written.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["bar 1", "foo 2"]);
    }

    #[test]
    fn wordcount_plugin_via_registry_matches_expected_counts() {
        let plugin = plugins::all()
            .into_iter()
            .find(|p| p.name() == "wordcount")
            .unwrap();
        let pairs = plugin.map("a.txt", "foo bar foo");
        assert_eq!(pairs.len(), 3);
    }
}
