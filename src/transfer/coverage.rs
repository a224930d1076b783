//! Coverage solver: picks a minimal set of query responses whose combined
//! inventories satisfy a data query request.
//!
//! The solver is a pure function of its inputs. Hosters advertising fewer
//! unavailable files rank first; a single- or two-hoster cover is taken when
//! one exists, otherwise a deterministic greedy pack claims the remaining
//! hashes in rank order.

use crate::hexutil;
use crate::messages::{DataQueryRequest, DataQueryResponse};
use crate::transfer::errors::{Result, TransferError};

/// One selected response and the subset of files claimed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageEntry {
    pub response: DataQueryResponse,
    pub file_hashes_needed: Vec<Vec<u8>>,
    pub file_hashes_needed_sizes: Vec<u64>,
}

pub fn solve(
    request: &DataQueryRequest,
    responses: &[DataQueryResponse],
) -> Result<Vec<CoverageEntry>> {
    for requested in &request.file_hashes {
        let offered = responses
            .iter()
            .any(|r| r.file_hashes.iter().any(|h| h == requested));
        if !offered {
            return Err(TransferError::IncompleteResponses(format!(
                "incomplete data responses: file hash {} was not found in the data query responses",
                hexutil::encode_no_prefix(requested)
            )));
        }
    }

    if responses.is_empty() {
        return Err(TransferError::IncompleteResponses(
            "incomplete data responses: no data query responses were collected".to_string(),
        ));
    }

    let mut ranked: Vec<&DataQueryResponse> = responses.iter().collect();
    ranked.sort_by_key(|r| r.unavailable_file_hashes.len());

    let first = ranked[0];
    let mut selection = vec![CoverageEntry {
        response: first.clone(),
        file_hashes_needed: first.file_hashes.clone(),
        file_hashes_needed_sizes: first.file_hashes_sizes.clone(),
    }];
    if first.unavailable_file_hashes.is_empty() {
        return Ok(selection);
    }

    let mut uncovered = first.unavailable_file_hashes.clone();

    // Two-hoster fast path: any response whose own unavailable list is
    // disjoint from what the first hoster lacks completes the cover.
    for candidate in ranked.iter().skip(1) {
        let disjoint = !candidate
            .unavailable_file_hashes
            .iter()
            .any(|h| uncovered.contains(h));
        if disjoint {
            selection.push(CoverageEntry {
                response: (*candidate).clone(),
                file_hashes_needed: candidate.file_hashes.clone(),
                file_hashes_needed_sizes: candidate.file_hashes_sizes.clone(),
            });
            return Ok(selection);
        }
    }

    // Greedy pack: in rank order, claim each response's intersection with
    // the uncovered set, shrinking it as we go.
    for candidate in ranked.iter().skip(1) {
        if uncovered.is_empty() {
            break;
        }
        let mut claimed_hashes = Vec::new();
        let mut claimed_sizes = Vec::new();
        for (idx, available) in candidate.file_hashes.iter().enumerate() {
            if uncovered.contains(available) {
                claimed_hashes.push(available.clone());
                claimed_sizes.push(candidate.file_hashes_sizes[idx]);
            }
        }
        if claimed_hashes.is_empty() {
            continue;
        }
        uncovered.retain(|h| !claimed_hashes.contains(h));
        selection.push(CoverageEntry {
            response: (*candidate).clone(),
            file_hashes_needed: claimed_hashes,
            file_hashes_needed_sizes: claimed_sizes,
        });
    }

    let selected_total: usize = selection.iter().map(|e| e.file_hashes_needed.len()).sum();
    if selected_total != request.file_hashes.len() {
        return Err(TransferError::IncompleteCoverage);
    }

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hashes: &[&[u8]]) -> DataQueryRequest {
        let mut request = DataQueryRequest {
            file_hashes: hashes.iter().map(|h| h.to_vec()).collect(),
            from_peer: "requester".to_string(),
            timestamp: 1,
            hash: Vec::new(),
        };
        request.hash = request.derive_hash();
        request
    }

    fn response(
        peer: &str,
        available: &[(&[u8], u64)],
        unavailable: &[&[u8]],
    ) -> DataQueryResponse {
        DataQueryResponse {
            from_peer: peer.to_string(),
            fees_per_byte: "0x2".to_string(),
            request_hash: vec![0x01],
            public_key: peer.as_bytes().to_vec(),
            signature: peer.as_bytes().to_vec(),
            file_hashes: available.iter().map(|(h, _)| h.to_vec()).collect(),
            file_hashes_sizes: available.iter().map(|(_, s)| *s).collect(),
            unavailable_file_hashes: unavailable.iter().map(|h| h.to_vec()).collect(),
            timestamp: 1,
        }
    }

    fn flattened(selection: &[CoverageEntry]) -> Vec<Vec<u8>> {
        selection
            .iter()
            .flat_map(|e| e.file_hashes_needed.clone())
            .collect()
    }

    #[test]
    fn single_hoster_with_everything_wins_alone() {
        let req = request(&[b"\xaa", b"\xbb"]);
        let responses = vec![
            response("partial", &[(b"\xaa", 10)], &[b"\xbb"]),
            response("full", &[(b"\xaa", 10), (b"\xbb", 20)], &[]),
        ];
        let selection = solve(&req, &responses).expect("solve");
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].response.from_peer, "full");
        assert_eq!(selection[0].file_hashes_needed_sizes, vec![10, 20]);
    }

    #[test]
    fn two_hoster_split_selects_both() {
        let req = request(&[b"\xaa", b"\xbb", b"\xcc"]);
        let responses = vec![
            response("r1", &[(b"\xaa", 10), (b"\xbb", 20)], &[b"\xcc"]),
            response("r2", &[(b"\xcc", 30)], &[b"\xaa", b"\xbb"]),
        ];
        let selection = solve(&req, &responses).expect("solve");
        assert_eq!(selection.len(), 2);
        assert_eq!(selection[0].response.from_peer, "r1");
        assert_eq!(selection[1].response.from_peer, "r2");

        let mut all = flattened(&selection);
        all.sort();
        let mut wanted = req.file_hashes.clone();
        wanted.sort();
        assert_eq!(all, wanted);
    }

    #[test]
    fn missing_hash_fails_with_incomplete_responses() {
        let req = request(&[b"\xaa", b"\xbb"]);
        let responses = vec![response("r1", &[(b"\xaa", 10)], &[b"\xbb"])];
        assert!(matches!(
            solve(&req, &responses),
            Err(TransferError::IncompleteResponses(_))
        ));
    }

    #[test]
    fn greedy_pack_covers_across_three_hosters() {
        let req = request(&[b"\xaa", b"\xbb", b"\xcc"]);
        // every pair of hosters shares an unavailable hash, so the disjoint
        // fast path cannot fire and the greedy packer must run
        let responses = vec![
            response("r1", &[(b"\xaa", 10)], &[b"\xbb", b"\xcc"]),
            response("r2", &[(b"\xbb", 20)], &[b"\xaa", b"\xcc"]),
            response("r3", &[(b"\xcc", 30)], &[b"\xaa", b"\xbb"]),
        ];
        let selection = solve(&req, &responses).expect("solve");
        assert_eq!(selection.len(), 3);

        let mut all = flattened(&selection);
        all.sort();
        let mut wanted = req.file_hashes.clone();
        wanted.sort();
        assert_eq!(all, wanted);
        // no double counting
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn solver_is_deterministic() {
        let req = request(&[b"\xaa", b"\xbb", b"\xcc"]);
        let responses = vec![
            response("r1", &[(b"\xaa", 10)], &[b"\xbb", b"\xcc"]),
            response("r2", &[(b"\xbb", 20), (b"\xcc", 30)], &[b"\xaa"]),
            response("r3", &[(b"\xbb", 20)], &[b"\xaa", b"\xcc"]),
        ];
        let a = solve(&req, &responses).expect("solve");
        let b = solve(&req, &responses).expect("solve");
        assert_eq!(a, b);
    }

    #[test]
    fn hosters_with_shorter_unavailable_lists_rank_first() {
        let req = request(&[b"\xaa"]);
        let responses = vec![
            response("worse", &[(b"\xaa", 10)], &[b"\xbb", b"\xcc"]),
            response("better", &[(b"\xaa", 10)], &[]),
        ];
        let selection = solve(&req, &responses).expect("solve");
        assert_eq!(selection[0].response.from_peer, "better");
        assert_eq!(selection.len(), 1);
    }
}
