/// An artist as seen by one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    id: String,
    name: String,
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
