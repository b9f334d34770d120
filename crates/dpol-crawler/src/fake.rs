//! In-memory drive for tests and dry runs.
//!
//! Implements both [`ItemLister`] and [`PermissionMutator`] over a mutable
//! item graph. Failures can be scripted per folder, item, or permission, and
//! call counters plus a peak-concurrency gauge let tests observe how the
//! crawler drives the API.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dpol_core::{
    ApiError, ChildPage, GranteeKind, Item, ItemId, ItemKind, ItemLister, Owner, Permission,
    PermissionId, PermissionMutator,
};
use parking_lot::Mutex;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Default)]
struct FakeState {
    items: HashMap<ItemId, Item>,
    children: HashMap<ItemId, Vec<ItemId>>,
    list_failures: HashMap<ItemId, VecDeque<ApiError>>,
    get_failures: HashMap<ItemId, ApiError>,
    delete_failures: HashMap<PermissionId, ApiError>,
    deleted: Vec<(ItemId, PermissionId)>,
}

pub struct FakeDrive {
    state: Mutex<FakeState>,
    page_size: usize,
    latency: Duration,
    pub get_calls: AtomicU64,
    pub list_calls: AtomicU64,
    pub delete_calls: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for FakeDrive {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            page_size: DEFAULT_PAGE_SIZE,
            latency: Duration::ZERO,
            get_calls: AtomicU64::new(0),
            list_calls: AtomicU64::new(0),
            delete_calls: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Simulated latency of every listing call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add or replace an item, optionally linking it under `parent`.
    pub fn insert(&self, item: Item, parent: Option<&str>) {
        let id = item.id.clone();
        let mut state = self.state.lock();
        state.items.insert(id.clone(), item);
        if let Some(parent) = parent {
            state.children.entry(ItemId::new(parent)).or_default().push(id);
        }
    }

    /// Give `child` an additional parent.
    pub fn link(&self, parent: &str, child: &str) {
        self.state
            .lock()
            .children
            .entry(ItemId::new(parent))
            .or_default()
            .push(ItemId::new(child));
    }

    pub fn item(&self, id: &str) -> Option<Item> {
        self.state.lock().items.get(&ItemId::new(id)).cloned()
    }

    /// Fail the next listing calls of `folder` with `errors`, in order.
    /// Once they are used up, listings succeed again.
    pub fn fail_listing(&self, folder: &str, errors: impl IntoIterator<Item = ApiError>) {
        self.state
            .lock()
            .list_failures
            .entry(ItemId::new(folder))
            .or_default()
            .extend(errors);
    }

    /// Fail every `get_item` call for `id`.
    pub fn fail_get(&self, id: &str, error: ApiError) {
        self.state.lock().get_failures.insert(ItemId::new(id), error);
    }

    /// Fail every deletion of `permission`.
    pub fn fail_delete(&self, permission: &str, error: ApiError) {
        self.state
            .lock()
            .delete_failures
            .insert(PermissionId::new(permission), error);
    }

    /// Successful deletions, in call order.
    pub fn deleted(&self) -> Vec<(ItemId, PermissionId)> {
        self.state.lock().deleted.clone()
    }

    /// Highest number of listing calls observed in flight at once.
    pub fn peak_concurrent_listings(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn page(&self, folder_id: &ItemId, page_token: Option<&str>) -> Result<ChildPage, ApiError> {
        let mut state = self.state.lock();
        if let Some(err) = state
            .list_failures
            .get_mut(folder_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        if !state.items.contains_key(folder_id) {
            return Err(ApiError::from_status("files.list", 404, format!("File not found: {folder_id}")));
        }

        let start = match page_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                ApiError::from_status("files.list", 400, format!("Invalid page token: {token}"))
            })?,
            None => 0,
        };
        let live: Vec<Item> = state
            .children
            .get(folder_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.items.get(id))
                    .filter(|item| !item.trashed)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let end = (start + self.page_size).min(live.len());
        let items = live.get(start..end).map(<[Item]>::to_vec).unwrap_or_default();
        let next_page_token = (end < live.len()).then(|| end.to_string());
        Ok(ChildPage {
            items,
            next_page_token,
        })
    }
}

#[async_trait]
impl ItemLister for FakeDrive {
    async fn get_item(&self, id: &ItemId) -> Result<Item, ApiError> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock();
        if let Some(err) = state.get_failures.get(id) {
            return Err(err.clone());
        }
        state
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::from_status("files.get", 404, format!("File not found: {id}")))
    }

    async fn list_children(
        &self,
        folder_id: &ItemId,
        page_token: Option<&str>,
    ) -> Result<ChildPage, ApiError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self.page(folder_id, page_token);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl PermissionMutator for FakeDrive {
    async fn delete_permission(
        &self,
        item_id: &ItemId,
        permission_id: &PermissionId,
    ) -> Result<(), ApiError> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if let Some(err) = state.delete_failures.get(permission_id) {
            return Err(err.clone());
        }
        let removed = state.items.get_mut(item_id).is_some_and(|item| {
            let before = item.permissions.len();
            item.permissions.retain(|p| &p.id != permission_id);
            item.permissions.len() < before
        });
        if !removed {
            return Err(ApiError::from_status(
                "permissions.delete",
                404,
                format!("Permission not found: {permission_id}"),
            ));
        }
        state.deleted.push((item_id.clone(), permission_id.clone()));
        Ok(())
    }
}

// -- Item builders -----------------------------------------------------------

pub fn folder(id: &str, name: &str) -> Item {
    Item {
        id: ItemId::new(id),
        name: name.to_string(),
        kind: ItemKind::Folder,
        trashed: false,
        link: Some(format!("https://drive.example/folders/{id}")),
        owners: vec![Owner {
            email: "owner@acme.com".into(),
            display_name: "Owner".into(),
        }],
        permissions: vec![],
    }
}

pub fn file(id: &str, name: &str, permissions: Vec<Permission>) -> Item {
    Item {
        kind: ItemKind::File,
        link: Some(format!("https://drive.example/file/{id}")),
        permissions,
        ..folder(id, name)
    }
}

fn grant(id: &str, grantee: GranteeKind, email: Option<&str>, domain: Option<&str>, role: &str) -> Permission {
    Permission {
        id: PermissionId::new(id),
        grantee,
        email: email.map(str::to_string),
        domain: domain.map(str::to_string),
        role: role.to_string(),
        deleted: false,
    }
}

pub fn user(id: &str, email: &str, role: &str) -> Permission {
    grant(id, GranteeKind::User, Some(email), None, role)
}

pub fn group(id: &str, email: &str, role: &str) -> Permission {
    grant(id, GranteeKind::Group, Some(email), None, role)
}

pub fn domain(id: &str, domain: &str, role: &str) -> Permission {
    grant(id, GranteeKind::Domain, None, Some(domain), role)
}

pub fn anyone(id: &str, role: &str) -> Permission {
    grant(id, GranteeKind::Anyone, None, None, role)
}
