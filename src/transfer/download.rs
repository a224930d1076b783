//! Parallel byte-range download engine.
//!
//! A download session splits the file into ranges, spawns one worker per
//! incomplete range and streams each range into its own part file. Progress
//! and per-range cancellation tokens live in the contract store; the
//! reassembly step concatenates the parts in range order once every worker
//! has finished.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::contract::{ContractStore, FilePartInfo, RangeDownloadContext};
use crate::crypto::PeerId;
use crate::hexutil;
use crate::messages::FileTransferInfo;
use crate::transfer::errors::{Result, TransferError};
use crate::transfer::ranges::{self, FileRange};
use crate::transfer::DataTransferService;

impl DataTransferService {
    /// Starts (or restarts) the download of one contract file. The engine
    /// answers `"started"` immediately; progress and errors are observable
    /// through [`DataTransferService::download_file_progress`].
    pub async fn download_file(
        &self,
        contract_hash_hex: &str,
        file_hash_hex: &str,
        re_download: bool,
    ) -> Result<&'static str> {
        let contract = self.contract_store.get_contract(contract_hash_hex)?;
        let file_hash = hexutil::decode_no_prefix(file_hash_hex)
            .map_err(|e| TransferError::Decode(format!("failed to decode file hash: {e}")))?;
        let hoster = PeerId::parse(&contract.file_hoster_response.from_peer).map_err(|e| {
            TransferError::Decode(format!("failed to decode file hoster's peer id: {e}"))
        })?;

        let mut file_size = 0u64;
        for (idx, needed) in contract.file_hashes_needed.iter().enumerate() {
            if *needed == file_hash {
                file_size = contract.file_hashes_needed_sizes[idx];
            }
        }
        if file_size == 0 {
            return Err(TransferError::UnknownFileSize);
        }

        self.contract_store
            .set_file_size(contract_hash_hex, &file_hash, file_size);

        tracing::info!(
            contract = %crate::logging::redact_hex(contract_hash_hex),
            file = %crate::logging::redact_hex(file_hash_hex),
            re_download,
            "starting file download"
        );
        let session = DownloadSession {
            service: self.clone(),
            contract_hash: contract.contract_hash.clone(),
            contract_hash_hex: contract_hash_hex.to_string(),
            file_hash,
            file_hash_hex: file_hash_hex.to_string(),
            file_size,
            hoster,
        };
        tokio::spawn(async move {
            session.run(re_download).await;
        });

        Ok("started")
    }

    /// Cancels every in-flight range of the file. A no-op when nothing is
    /// being transferred.
    pub fn pause_file_download(&self, contract_hash_hex: &str, file_hash_hex: &str) -> Result<()> {
        self.contract_store.get_contract(contract_hash_hex)?;
        let file_hash = hexutil::decode_no_prefix(file_hash_hex)
            .map_err(|e| TransferError::Decode(format!("failed to decode file hash: {e}")))?;
        let key = ContractStore::download_context_key(contract_hash_hex, &file_hash);
        self.contract_store.cancel_download_contexts(&key);
        Ok(())
    }

    pub fn download_file_progress(
        &self,
        contract_hash_hex: &str,
        file_hash_hex: &str,
    ) -> Result<(u64, Option<String>)> {
        let file_hash = hexutil::decode_no_prefix(file_hash_hex)
            .map_err(|e| TransferError::Decode(format!("failed to decode file hash: {e}")))?;
        let info = self.contract_store.file_info(contract_hash_hex, &file_hash)?;
        Ok((info.bytes_transferred, info.error))
    }
}

struct DownloadSession {
    service: DataTransferService,
    contract_hash: Vec<u8>,
    contract_hash_hex: String,
    file_hash: Vec<u8>,
    file_hash_hex: String,
    file_size: u64,
    hoster: PeerId,
}

impl DownloadSession {
    fn store(&self) -> &ContractStore {
        &self.service.contract_store
    }

    fn part_path(&self, dir: &Path, range: &FileRange) -> PathBuf {
        dir.join(format!(
            "{}_part_{}_{}",
            self.file_hash_hex, range.from, range.to
        ))
    }

    async fn run(&self, re_download: bool) {
        let context_key =
            ContractStore::download_context_key(&self.contract_hash_hex, &self.file_hash);

        if re_download {
            // Cancel before deleting: cancelled workers refuse further
            // progress increments, so stragglers cannot corrupt the counter.
            self.store().cancel_download_contexts(&context_key);
            for part in self
                .store()
                .downloaded_file_part_infos(&self.contract_hash_hex, &self.file_hash)
            {
                if let Err(error) = tokio::fs::remove_file(&part.destination_path).await {
                    tracing::warn!(
                        path = %part.destination_path.display(),
                        %error,
                        "failed to remove old downloaded file part"
                    );
                }
            }
            if let Err(error) = self
                .store()
                .reset_transferred_bytes(&self.contract_hash_hex, &self.file_hash)
            {
                tracing::warn!(%error, "failed to reset transferred bytes");
            }
        }

        let contract_dir = self
            .service
            .data_verification
            .download_directory()
            .join(&self.contract_hash_hex);
        if let Err(error) = tokio::fs::create_dir_all(&contract_dir).await {
            self.store().set_error(
                &self.contract_hash_hex,
                &self.file_hash,
                format!("failed to create download directory: {error}"),
            );
            return;
        }

        let mut plan = ranges::plan_file_ranges(self.file_size);
        if let Ok(existing) = ranges::scan_downloaded_parts(&contract_dir, &self.file_hash_hex).await
        {
            ranges::reconcile(&mut plan, &existing);
        }

        // Register every planned part so reassembly sees completed ranges
        // even when no worker runs for them, and credit bytes already on
        // disk to the progress counter.
        let mut already_downloaded = 0u64;
        for range in &plan {
            let downloaded = range.downloaded_size.min(range.len());
            already_downloaded += downloaded;
            self.store().record_file_part(
                &self.contract_hash_hex,
                &self.file_hash,
                FilePartInfo {
                    from: range.from,
                    to: range.to,
                    destination_path: self.part_path(&contract_dir, range),
                    downloaded_size: downloaded,
                    error: None,
                },
            );
        }
        self.store()
            .raise_transferred_to(&self.contract_hash_hex, &self.file_hash, already_downloaded);

        let mut workers = Vec::new();
        for range in plan.iter().filter(|r| !r.is_complete()).copied() {
            let token = CancellationToken::new();
            self.store().set_download_context(
                &context_key,
                RangeDownloadContext {
                    from: range.from + range.downloaded_size,
                    to: range.to,
                    token: token.clone(),
                },
            );
            let session = DownloadSession {
                service: self.service.clone(),
                contract_hash: self.contract_hash.clone(),
                contract_hash_hex: self.contract_hash_hex.clone(),
                file_hash: self.file_hash.clone(),
                file_hash_hex: self.file_hash_hex.clone(),
                file_size: self.file_size,
                hoster: self.hoster.clone(),
            };
            let part_path = self.part_path(&contract_dir, &range);
            workers.push(tokio::spawn(async move {
                session.range_worker(range, part_path, token).await;
            }));
        }
        for worker in workers {
            let _ = worker.await;
        }

        let transferred = self
            .store()
            .transferred_bytes(&self.contract_hash_hex, &self.file_hash);
        if transferred != self.file_size {
            self.store().set_error(
                &self.contract_hash_hex,
                &self.file_hash,
                TransferError::SizeMismatch {
                    expected: self.file_size,
                    actual: transferred,
                }
                .to_string(),
            );
            return;
        }

        let part_infos = self
            .store()
            .downloaded_file_part_infos(&self.contract_hash_hex, &self.file_hash);
        let output_path = contract_dir.join(&self.file_hash_hex);
        if let Err(error) = concatenate_parts(&output_path, &part_infos).await {
            self.store().set_error(
                &self.contract_hash_hex,
                &self.file_hash,
                format!("failed to concatenate downloaded file parts: {error}"),
            );
            return;
        }
        tracing::info!(path = %output_path.display(), "reassembled downloaded file");

        for part in &part_infos {
            if let Err(error) = tokio::fs::remove_file(&part.destination_path).await {
                tracing::warn!(
                    path = %part.destination_path.display(),
                    %error,
                    "failed to remove file part after reassembly"
                );
            }
        }
    }

    /// Streams one byte range into its part file. Cancellation is silent;
    /// any other failure is recorded against the part.
    async fn range_worker(&self, range: FileRange, part_path: PathBuf, token: CancellationToken) {
        let part_name = format!(
            "{}_part_{}_{}",
            self.file_hash_hex, range.from, range.to
        );
        let request = FileTransferInfo {
            contract_hash: self.contract_hash.clone(),
            file_hash: self.file_hash.clone(),
            file_size: self.file_size,
            from: range.from + range.downloaded_size,
            to: range.to,
        };

        let stream = tokio::select! {
            _ = token.cancelled() => return,
            result = self
                .service
                .data_verification
                .request_file_transfer(self.hoster.clone(), request) => result,
        };
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                if !token.is_cancelled() {
                    self.record_part_error(&part_name, error.to_string());
                }
                return;
            }
        };

        let mut file = match tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&part_path)
            .await
        {
            Ok(file) => file,
            Err(error) => {
                self.record_part_error(&part_name, error.to_string());
                return;
            }
        };

        let mut downloaded = range.downloaded_size;
        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => return,
                chunk = stream.next() => chunk,
            };
            match chunk {
                None => break,
                Some(Ok(chunk)) => {
                    if let Err(error) = file.write_all(&chunk).await {
                        if !token.is_cancelled() {
                            self.record_part_error(&part_name, error.to_string());
                        }
                        return;
                    }
                    downloaded += chunk.len() as u64;
                    self.store().record_file_part(
                        &self.contract_hash_hex,
                        &self.file_hash,
                        FilePartInfo {
                            from: range.from,
                            to: range.to,
                            destination_path: part_path.clone(),
                            downloaded_size: downloaded,
                            error: None,
                        },
                    );
                    if !self.store().increment_transferred(
                        &self.contract_hash_hex,
                        &self.file_hash,
                        &token,
                        chunk.len() as u64,
                    ) {
                        // cancelled while streaming
                        return;
                    }
                }
                Some(Err(error)) => {
                    if !token.is_cancelled() {
                        self.record_part_error(&part_name, error.to_string());
                    }
                    return;
                }
            }
        }
        if let Err(error) = file.flush().await {
            self.record_part_error(&part_name, error.to_string());
        }
    }

    fn record_part_error(&self, part_name: &str, message: String) {
        self.store().set_file_part_error(
            &self.contract_hash_hex,
            &self.file_hash,
            part_name,
            message,
        );
    }
}

async fn concatenate_parts(output: &Path, parts: &[FilePartInfo]) -> std::io::Result<()> {
    let mut out = tokio::fs::File::create(output).await?;
    for part in parts {
        let mut input = tokio::fs::File::open(&part.destination_path).await?;
        tokio::io::copy(&mut input, &mut out).await?;
    }
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::hexutil;
    use crate::transfer::testutil::{signed_contract, signed_response, test_env, TestEnv};
    use crate::transfer::TransferError;

    const FILE_AA: &[u8] = b"\xaa";

    /// Seeds a single-file contract for 20 hosted bytes and returns
    /// `(contract_hash_hex, contents)`.
    fn seed_single_file_contract(env: &TestEnv, size: u64) -> (String, Vec<u8>) {
        let contents: Vec<u8> = (0..size as u8).collect();
        env.verification.host_file(FILE_AA, contents.clone());
        let response = signed_response(&env.hoster_key, b"req", "0x2", &[(FILE_AA, size)], &[]);
        let contract = signed_contract(env, response, &[(FILE_AA, size)]);
        let contract_hash_hex = hexutil::encode(&contract.contract_hash);
        env.store.create_contract(contract);
        (contract_hash_hex, contents)
    }

    /// Polls until the transferred counter reaches `expected`. A recorded
    /// error is only fatal at the deadline: a paused previous session may
    /// have left a stale size-mismatch error behind that the restarted
    /// session clears moments later.
    async fn wait_for_transfer(env: &TestEnv, contract_hash_hex: &str, expected: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            let (transferred, error) = env
                .service
                .download_file_progress(contract_hash_hex, "aa")
                .expect("progress");
            if transferred == expected && error.is_none() {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "download did not reach {expected} bytes in time (at {transferred}, error {error:?})"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Polls until the reassembled file exists with exactly `expected`
    /// contents, tolerating reads that catch the file mid-write.
    async fn wait_for_output_file(env: &TestEnv, contract_hash_hex: &str, expected: &[u8]) {
        let path = env.download_dir.join(contract_hash_hex).join("aa");
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            if let Ok(contents) = tokio::fs::read(&path).await
                && contents == expected
            {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "reassembled file did not appear at {}",
                path.display()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn download_reassembles_the_file_and_cleans_parts() {
        let env = test_env("datahaul_download_happy", 1);
        let (contract_hash_hex, contents) = seed_single_file_contract(&env, 20);

        let status = env
            .service
            .download_file(&contract_hash_hex, "aa", false)
            .await
            .expect("start");
        assert_eq!(status, "started");

        wait_for_transfer(&env, &contract_hash_hex, 20).await;
        wait_for_output_file(&env, &contract_hash_hex, &contents).await;

        // part files are deleted after reassembly
        let parts = crate::transfer::ranges::scan_downloaded_parts(
            &env.download_dir.join(&contract_hash_hex),
            "aa",
        )
        .await
        .expect("scan");
        assert!(parts.is_empty());

        let _ = std::fs::remove_dir_all(&env.download_dir);
    }

    #[tokio::test]
    async fn resume_requests_only_the_missing_bytes() {
        let env = test_env("datahaul_download_resume", 1);
        let (contract_hash_hex, contents) = seed_single_file_contract(&env, 20);

        // pre-seed the first range's part file with 3 of its 5 bytes
        let contract_dir = env.download_dir.join(&contract_hash_hex);
        tokio::fs::create_dir_all(&contract_dir).await.expect("mkdir");
        tokio::fs::write(contract_dir.join("aa_part_0_4"), &contents[..3])
            .await
            .expect("seed part");

        env.service
            .download_file(&contract_hash_hex, "aa", false)
            .await
            .expect("start");

        wait_for_transfer(&env, &contract_hash_hex, 20).await;
        wait_for_output_file(&env, &contract_hash_hex, &contents).await;

        let _ = std::fs::remove_dir_all(&env.download_dir);
    }

    #[tokio::test]
    async fn unknown_file_hash_has_no_size() {
        let env = test_env("datahaul_download_nosize", 1);
        let (contract_hash_hex, _) = seed_single_file_contract(&env, 20);
        assert!(matches!(
            env.service.download_file(&contract_hash_hex, "bb", false).await,
            Err(TransferError::UnknownFileSize)
        ));
    }

    #[tokio::test]
    async fn download_of_unknown_contract_is_not_found() {
        let env = test_env("datahaul_download_nocontract", 1);
        assert!(matches!(
            env.service.download_file("0xdead", "aa", false).await,
            Err(TransferError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn pause_at_rest_is_a_noop() {
        let env = test_env("datahaul_download_pause_rest", 1);
        let (contract_hash_hex, _) = seed_single_file_contract(&env, 20);
        env.service
            .pause_file_download(&contract_hash_hex, "aa")
            .expect("pause");
        env.service
            .pause_file_download(&contract_hash_hex, "aa")
            .expect("pause again");
    }

    #[tokio::test]
    async fn pause_stops_progress_and_redownload_recovers() {
        let env = test_env("datahaul_download_pause", 1);
        let (contract_hash_hex, contents) = seed_single_file_contract(&env, 20);

        env.verification
            .stall_after_first_chunk
            .store(true, Ordering::SeqCst);
        env.service
            .download_file(&contract_hash_hex, "aa", false)
            .await
            .expect("start");

        // wait until some bytes arrived, then pause
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            let (transferred, _) = env
                .service
                .download_file_progress(&contract_hash_hex, "aa")
                .expect("progress");
            if transferred > 0 {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "no progress before pause");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        env.service
            .pause_file_download(&contract_hash_hex, "aa")
            .expect("pause");

        let (snapshot, _) = env
            .service
            .download_file_progress(&contract_hash_hex, "aa")
            .expect("progress");
        tokio::time::sleep(Duration::from_millis(80)).await;
        let (after, _) = env
            .service
            .download_file_progress(&contract_hash_hex, "aa")
            .expect("progress");
        assert_eq!(snapshot, after, "transferred bytes moved after pause");

        // restart from scratch with working transfers
        env.verification
            .stall_after_first_chunk
            .store(false, Ordering::SeqCst);
        env.service
            .download_file(&contract_hash_hex, "aa", true)
            .await
            .expect("re-download");

        wait_for_transfer(&env, &contract_hash_hex, 20).await;
        wait_for_output_file(&env, &contract_hash_hex, &contents).await;

        let _ = std::fs::remove_dir_all(&env.download_dir);
    }

    #[tokio::test]
    async fn redownload_after_success_yields_the_same_file() {
        let env = test_env("datahaul_download_again", 1);
        let (contract_hash_hex, contents) = seed_single_file_contract(&env, 21);

        env.service
            .download_file(&contract_hash_hex, "aa", false)
            .await
            .expect("start");
        wait_for_transfer(&env, &contract_hash_hex, 21).await;
        wait_for_output_file(&env, &contract_hash_hex, &contents).await;

        tokio::fs::remove_file(env.download_dir.join(&contract_hash_hex).join("aa"))
            .await
            .expect("remove first output");
        env.service
            .download_file(&contract_hash_hex, "aa", true)
            .await
            .expect("restart");
        wait_for_transfer(&env, &contract_hash_hex, 21).await;
        wait_for_output_file(&env, &contract_hash_hex, &contents).await;

        let _ = std::fs::remove_dir_all(&env.download_dir);
    }

    #[tokio::test]
    async fn small_file_uses_a_single_range() {
        let env = test_env("datahaul_download_small", 1);
        let (contract_hash_hex, contents) = seed_single_file_contract(&env, 3);

        env.service
            .download_file(&contract_hash_hex, "aa", false)
            .await
            .expect("start");
        wait_for_transfer(&env, &contract_hash_hex, 3).await;
        wait_for_output_file(&env, &contract_hash_hex, &contents).await;

        let _ = std::fs::remove_dir_all(&env.download_dir);
    }
}
