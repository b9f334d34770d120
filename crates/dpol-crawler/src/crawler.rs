//! # Hierarchy Crawler
//!
//! Walks the folder hierarchy below a root, registering every child with the
//! permitted-domain set it inherits along the path it was reached by.
//!
//! ## Concurrency
//!
//! Each folder's children are listed sequentially (pagination is a chain of
//! page tokens), then every child folder is crawled in its own task on a
//! [`JoinSet`]. A folder's crawl does not complete until all of its child
//! tasks have completed, so the root's completion means the entire reachable
//! hierarchy is registered.
//!
//! An optional [`Semaphore`] bounds how many folders are listing at once. A
//! permit is held only while pages are being fetched, never while waiting on
//! children, so a deep hierarchy cannot exhaust the pool and deadlock.
//!
//! ## Multi-parent folders
//!
//! A folder reachable through several parents is crawled once per path. Each
//! crawl propagates its own path's set, and the registry unions them, so
//! every descendant ends up with the union over all paths.
//!
//! ## Failures
//!
//! | Listing error            | Effect                                        |
//! |--------------------------|-----------------------------------------------|
//! | 400 / 404                | Folder treated as empty                       |
//! | transient after retries  | Branch failure recorded, subtree incomplete   |
//! | decode / other status    | Branch failure recorded, subtree incomplete   |
//! | repeated page token      | Branch failure recorded, pages so far kept    |
//! | 401 / 403                | Fatal; sibling tasks are shut down            |

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dpol_core::{
    ApiError, Item, ItemId, ItemLister, PermittedDomains, PolicyStore, RetryPolicy, RunConfig,
    RunError,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::session::CrawlSession;

type CrawlFuture = Pin<Box<dyn Future<Output = Result<(), RunError>> + Send>>;

/// What a completed crawl saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Distinct items registered.
    pub items_registered: usize,
    /// Folder listings performed (a folder reached by two paths counts twice).
    pub folders_listed: u64,
    /// Folders whose listing failed non-fatally.
    pub branch_failures: usize,
}

/// Concurrent crawler over an [`ItemLister`].
pub struct Crawler {
    shared: Arc<Shared>,
}

struct Shared {
    lister: Arc<dyn ItemLister>,
    policy: Arc<PolicyStore>,
    session: CrawlSession,
    retry: RetryPolicy,
    child_delay: Duration,
    listing_permits: Option<Arc<Semaphore>>,
    folders_listed: AtomicU64,
}

impl Crawler {
    pub fn new(
        lister: Arc<dyn ItemLister>,
        policy: Arc<PolicyStore>,
        session: CrawlSession,
        config: &RunConfig,
    ) -> Self {
        let listing_permits = config
            .max_concurrent_listings
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        Self {
            shared: Arc::new(Shared {
                lister,
                policy,
                session,
                retry: config.retry,
                child_delay: config.child_delay,
                listing_permits,
                folders_listed: AtomicU64::new(0),
            }),
        }
    }

    /// Crawl everything below `root`, which must be a live folder.
    ///
    /// The session registry is cleared first. On success every reachable
    /// item is registered and no crawl task is still running. On a fatal
    /// error all outstanding tasks are shut down before returning.
    pub async fn crawl(self, root: &Item) -> Result<CrawlSummary, RunError> {
        let shared = self.shared;
        shared.session.registry().clear();

        let seed = PermittedDomains::new().with(shared.policy.domain_for(&root.id));
        tracing::info!(
            root = %root.id,
            name = %root.name,
            permitted = ?seed,
            "starting crawl"
        );

        Arc::clone(&shared)
            .crawl_folder(root.id.clone(), seed, vec![root.id.clone()])
            .await?;

        let summary = CrawlSummary {
            items_registered: shared.session.registry().len(),
            folders_listed: shared.folders_listed.load(Ordering::Relaxed),
            branch_failures: shared.session.branch_failures().len(),
        };
        tracing::info!(
            items = summary.items_registered,
            folders = summary.folders_listed,
            branch_failures = summary.branch_failures,
            "crawl joined"
        );
        Ok(summary)
    }
}

impl Shared {
    /// Register the children of `folder_id` and crawl each child folder
    /// concurrently, returning once every descendant task has finished.
    ///
    /// `path` holds the ancestors on the current path, root first, and is
    /// used to refuse descending into a folder that contains itself.
    fn crawl_folder(
        self: Arc<Self>,
        folder_id: ItemId,
        inherited: PermittedDomains,
        path: Vec<ItemId>,
    ) -> CrawlFuture {
        Box::pin(async move {
            let children = self.list_all_children(&folder_id).await?;
            let mut tasks = JoinSet::new();

            for (index, child) in children.into_iter().enumerate() {
                if index > 0 && !self.child_delay.is_zero() {
                    tokio::time::sleep(self.child_delay).await;
                }

                // Snapshot this child's set before any task can observe it.
                let own_rule = if child.is_folder() {
                    self.policy.domain_for(&child.id)
                } else {
                    None
                };
                let permitted = inherited.with(own_rule);

                let descend = if !child.is_folder() {
                    None
                } else if path.contains(&child.id) {
                    self.session.log().warn(format!(
                        "Folder {} is its own ancestor under {folder_id}; not descending again",
                        child.id
                    ));
                    None
                } else {
                    Some(child.id.clone())
                };

                tracing::trace!(parent = %folder_id, child = %child.id, kind = %child.kind.label(), "discovered");
                // The crawl root is never registered, even when a cycle leads back to it.
                if path.first() != Some(&child.id) {
                    self.session.registry().ensure(child, &permitted);
                }

                if let Some(child_id) = descend {
                    let mut child_path = path.clone();
                    child_path.push(child_id.clone());
                    tasks.spawn(Arc::clone(&self).crawl_folder(child_id, permitted, child_path));
                }
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(fatal)) => {
                        tasks.shutdown().await;
                        return Err(fatal);
                    }
                    Err(join_err) if join_err.is_panic() => {
                        tasks.shutdown().await;
                        std::panic::resume_unwind(join_err.into_panic());
                    }
                    // Cancelled: only happens after shutdown, which we never
                    // call while still joining.
                    Err(_) => {}
                }
            }
            Ok(())
        })
    }

    /// Fetch every page of a folder's children, holding one listing permit
    /// for the duration.
    ///
    /// Non-fatal failures end pagination and keep the pages fetched so far.
    async fn list_all_children(&self, folder_id: &ItemId) -> Result<Vec<Item>, RunError> {
        let _permit = match &self.listing_permits {
            Some(permits) => Arc::clone(permits).acquire_owned().await.ok(),
            None => None,
        };
        self.folders_listed.fetch_add(1, Ordering::Relaxed);

        let lister = &self.lister;
        let session = &self.session;
        let mut children = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.as_deref();
            let result = self
                .retry
                .run("files.list", move || {
                    session.record_api_call();
                    lister.list_children(folder_id, token)
                })
                .await;

            match result {
                Ok(page) => {
                    children.extend(page.items);
                    match page.next_page_token {
                        Some(next) if token == Some(next.as_str()) => {
                            let err = ApiError::Decode {
                                endpoint: "files.list".to_string(),
                                message: format!("next page token {next:?} repeats the token just used"),
                            };
                            session.record_branch_failure(folder_id.clone(), err);
                            break;
                        }
                        Some(next) => page_token = Some(next),
                        None => break,
                    }
                }
                Err(err) if err.is_authorization() => {
                    return Err(RunError::Authorization {
                        operation: format!("listing folder {folder_id}"),
                        source: err,
                    });
                }
                Err(err) if err.is_not_found_or_bad_request() => {
                    session.log().warn(format!(
                        "Folder {folder_id} could not be listed, treating as empty: {err}"
                    ));
                    break;
                }
                Err(err) => {
                    session.record_branch_failure(folder_id.clone(), err);
                    break;
                }
            }
        }

        tracing::debug!(folder_id = %folder_id, children = children.len(), "listed folder");
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{folder, FakeDrive};

    fn crawler(drive: &Arc<FakeDrive>, policy: PolicyStore, session: &CrawlSession) -> Crawler {
        let config = RunConfig::new("root");
        Crawler::new(drive.clone(), Arc::new(policy), session.clone(), &config)
    }

    #[tokio::test]
    async fn empty_root_registers_nothing() {
        let drive = Arc::new(FakeDrive::new());
        drive.insert(folder("root", "Root"), None);
        let session = CrawlSession::new();
        let policy = PolicyStore::new(vec![dpol_core::PolicyRule::new("root", "acme.com")]).unwrap();

        let summary = crawler(&drive, policy, &session)
            .crawl(&drive.item("root").unwrap())
            .await
            .unwrap();

        assert_eq!(summary.items_registered, 0);
        assert_eq!(summary.folders_listed, 1);
        assert_eq!(session.api_call_count(), 1);
    }

    #[tokio::test]
    async fn self_containing_folder_is_not_descended_twice() {
        let drive = Arc::new(FakeDrive::new());
        drive.insert(folder("root", "Root"), None);
        drive.insert(folder("loop", "Loop"), Some("root"));
        drive.link("loop", "loop");
        let session = CrawlSession::new();
        let policy = PolicyStore::new(vec![dpol_core::PolicyRule::new("root", "acme.com")]).unwrap();

        let summary = crawler(&drive, policy, &session)
            .crawl(&drive.item("root").unwrap())
            .await
            .unwrap();

        assert_eq!(summary.items_registered, 1);
        assert_eq!(summary.folders_listed, 2);
        assert_eq!(session.log().warning_count(), 1);
    }

    #[tokio::test]
    async fn cycle_back_to_root_does_not_register_root() {
        let drive = Arc::new(FakeDrive::new());
        drive.insert(folder("root", "Root"), None);
        drive.insert(folder("a", "A"), Some("root"));
        drive.link("a", "root");
        let session = CrawlSession::new();
        let policy = PolicyStore::new(vec![dpol_core::PolicyRule::new("root", "acme.com")]).unwrap();

        let summary = crawler(&drive, policy, &session)
            .crawl(&drive.item("root").unwrap())
            .await
            .unwrap();

        assert_eq!(summary.items_registered, 1);
        assert_eq!(summary.folders_listed, 2);
        assert!(session.registry().get(&ItemId::new("root")).is_none());
        assert!(session.registry().get(&ItemId::new("a")).is_some());
        assert_eq!(session.log().warning_count(), 1);
    }

    /// Serves one item and always the same continuation token.
    struct StuckPager {
        calls: AtomicU64,
    }

    #[async_trait::async_trait]
    impl ItemLister for StuckPager {
        async fn get_item(&self, id: &ItemId) -> Result<Item, ApiError> {
            Err(ApiError::from_status("files.get", 404, format!("File not found: {id}")))
        }

        async fn list_children(
            &self,
            _folder_id: &ItemId,
            _page_token: Option<&str>,
        ) -> Result<dpol_core::ChildPage, ApiError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(dpol_core::ChildPage {
                items: vec![crate::fake::file("f1", "Doc", vec![])],
                next_page_token: Some("page-2".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn repeated_page_token_ends_the_listing() {
        let pager = Arc::new(StuckPager { calls: AtomicU64::new(0) });
        let session = CrawlSession::new();
        let policy = PolicyStore::new(vec![dpol_core::PolicyRule::new("root", "acme.com")]).unwrap();

        let summary = Crawler::new(pager.clone(), Arc::new(policy), session.clone(), &RunConfig::new("root"))
            .crawl(&folder("root", "Root"))
            .await
            .unwrap();

        assert_eq!(pager.calls.load(Ordering::Relaxed), 2);
        assert_eq!(summary.items_registered, 1);
        assert_eq!(summary.branch_failures, 1);
        assert_eq!(session.branch_failures()[0].folder_id.as_str(), "root");
    }

    #[tokio::test(start_paused = true)]
    async fn child_delay_paces_siblings() {
        let drive = Arc::new(FakeDrive::new());
        drive.insert(folder("root", "Root"), None);
        for i in 0..3 {
            drive.insert(crate::fake::file(&format!("f{i}"), "F", vec![]), Some("root"));
        }
        let session = CrawlSession::new();
        let policy = PolicyStore::new(vec![dpol_core::PolicyRule::new("root", "acme.com")]).unwrap();
        let mut config = RunConfig::new("root");
        config.child_delay = Duration::from_secs(2);

        let started = tokio::time::Instant::now();
        Crawler::new(drive.clone(), Arc::new(policy), session.clone(), &config)
            .crawl(&drive.item("root").unwrap())
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
        assert_eq!(session.registry().len(), 3);
    }
}
