// GFA v1 input adapter
//
// Parses the S and L lines of a (possibly gzipped) GFA file into a
// VariationGraph. The index addresses nodes by dense rank, so the input
// must be a compacted graph: numeric 1-based ids with no holes. Overlaps
// other than 0M or * are rejected; P/W and tag fields are ignored.

use crate::graph::VariationGraph;
use crate::seqpos::Handle;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

fn bad_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn open_maybe_gz(path: &Path) -> io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Read a compacted GFA v1 graph.
pub fn read_gfa(path: &Path) -> io::Result<VariationGraph> {
    let reader = BufReader::new(open_maybe_gz(path)?);

    let mut segments: Vec<(u64, Vec<u8>)> = Vec::new();
    let mut links: Vec<(u64, bool, u64, bool)> = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let mut fields = line.split('\t');
        match fields.next() {
            Some("S") => {
                let id = parse_id(fields.next(), lineno)?;
                let seq = fields
                    .next()
                    .filter(|s| !s.is_empty() && *s != "*")
                    .ok_or_else(|| bad_data(format!("line {}: S record without sequence", lineno + 1)))?;
                segments.push((id, seq.as_bytes().to_ascii_uppercase()));
            }
            Some("L") => {
                let from = parse_id(fields.next(), lineno)?;
                let from_rev = parse_orient(fields.next(), lineno)?;
                let to = parse_id(fields.next(), lineno)?;
                let to_rev = parse_orient(fields.next(), lineno)?;
                match fields.next() {
                    Some("0M") | Some("*") | None => {}
                    Some(other) => {
                        return Err(bad_data(format!(
                            "line {}: unsupported overlap {:?} (graph must be blunt-ended)",
                            lineno + 1,
                            other
                        )));
                    }
                }
                links.push((from, from_rev, to, to_rev));
            }
            _ => {}
        }
    }

    segments.sort_by_key(|(id, _)| *id);
    let n = segments.len() as u64;
    for (i, (id, _)) in segments.iter().enumerate() {
        if *id != i as u64 + 1 {
            return Err(bad_data(format!(
                "node ids must be dense and 1-based (expected {}, found {}); compact the graph first",
                i + 1,
                id
            )));
        }
    }

    let mut graph = VariationGraph::new();
    for (_, seq) in segments {
        graph.add_node(seq);
    }
    for (from, from_rev, to, to_rev) in links {
        if from == 0 || from > n || to == 0 || to > n {
            return Err(bad_data(format!("link references unknown node {}->{}", from, to)));
        }
        graph.add_edge(Handle::pack(from - 1, from_rev), Handle::pack(to - 1, to_rev));
    }
    Ok(graph)
}

fn parse_id(field: Option<&str>, lineno: usize) -> io::Result<u64> {
    field
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| bad_data(format!("line {}: node id is not numeric", lineno + 1)))
}

fn parse_orient(field: Option<&str>, lineno: usize) -> io::Result<bool> {
    match field {
        Some("+") => Ok(false),
        Some("-") => Ok(true),
        _ => Err(bad_data(format!("line {}: bad orientation field", lineno + 1))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphAccess;
    use std::io::Write;

    fn write_gfa(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::path::PathBuf::from("target/test_gfa");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_segments_and_links() {
        let path = write_gfa(
            "ok.gfa",
            "H\tVN:Z:1.0\nS\t1\tACGT\nS\t2\tGGGA\nL\t1\t+\t2\t+\t0M\n",
        );
        let g = read_gfa(&path).unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.node_sequence(0), b"ACGT");
        assert_eq!(g.successors(Handle::pack(0, false)), vec![Handle::pack(1, false)]);
    }

    #[test]
    fn rejects_sparse_ids() {
        let path = write_gfa("sparse.gfa", "S\t1\tACGT\nS\t3\tGGGA\n");
        assert!(read_gfa(&path).is_err());
    }

    #[test]
    fn rejects_overlapping_links() {
        let path = write_gfa(
            "overlap.gfa",
            "S\t1\tACGT\nS\t2\tGGGA\nL\t1\t+\t2\t+\t5M\n",
        );
        assert!(read_gfa(&path).is_err());
    }
}
