//! The sequential oracle: runs a plugin's `Map` over every input file and
//! `Reduce` over every resulting key group in a single process, with no
//! RPC, no workers, and no intermediate files. Exists so a distributed run
//! can be checked against a known-good baseline.

use crate::mr::plugin::Plugin;
use crate::mr::rpc::Pair;

/// Run `plugin` over `inputs` sequentially and write one line per key,
/// sorted, to `output_path`.
pub fn run(plugin: &dyn Plugin, inputs: &[String], output_path: &str) -> anyhow::Result<()> {
    let mut pairs: Vec<Pair> = Vec::new();
    for path in inputs {
        let contents = std::fs::read_to_string(path)?;
        pairs.extend(plugin.map(path, &contents));
    }

    pairs.sort_by(|a, b| a.key.cmp(&b.key));

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

    std::fs::write(output_path, output)?;
    Ok(())
}
