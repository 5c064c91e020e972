use tracing::info;

use crate::registry::{Registry, DEFAULT_STORE};
use crate::validate::validate_name;
use crate::{CoreError, Record, RecordId, SharedStore, StoreError};

/// Input for [`CreateUser::perform`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
}

/// Creates a user record in the injected store.
///
/// The store is fixed when the operation is built, either handed in directly
/// or resolved once from a [`Registry`]. Swapping the registry binding
/// afterwards does not affect an operation that already exists.
pub struct CreateUser {
    db: SharedStore,
}

impl CreateUser {
    pub fn new(db: SharedStore) -> Self {
        Self { db }
    }

    /// Build the operation against whatever is bound to [`DEFAULT_STORE`].
    pub fn from_registry(registry: &Registry) -> Result<Self, CoreError> {
        Ok(Self::new(registry.resolve(DEFAULT_STORE)?))
    }

    /// Validate the input and store `{"name": <name>}` under the next free
    /// numeric id. Returns the id used.
    pub fn perform(&self, input: NewUser) -> Result<RecordId, CoreError> {
        let name = validate_name(&input.name)?;
        let id = self.next_id()?;
        self.db.add(id.clone(), Record::new().with("name", name))?;
        info!(%id, "user created");
        Ok(id)
    }

    /// One past the highest numeric id in the store; non-numeric ids are ignored.
    fn next_id(&self) -> Result<RecordId, StoreError> {
        let highest = self
            .db
            .list()?
            .keys()
            .filter_map(RecordId::as_number)
            .max()
            .unwrap_or(0);
        highest
            .checked_add(1)
            .map(RecordId::from)
            .ok_or_else(|| StoreError::Backend("numeric id space exhausted".into()))
    }
}
