/// Which fields or relations of a kind a merge should touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Only(Vec<String>),
    /// Every field or relation of the kind defined on the schema.
    All,
}

impl Selection {
    pub fn only<I, S>(names: I) -> Selection
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Selection::None => true,
            Selection::Only(names) => names.is_empty(),
            Selection::All => false,
        }
    }
}

/// Options of a merge.
///
/// By default every non-key scalar field is copied from `other`, no
/// relation is transferred and nothing is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub fields: Selection,
    pub many_to_many: Selection,
    pub reverse_relations: Selection,
    pub commit: bool,
}

impl Default for MergeRequest {
    fn default() -> Self {
        MergeRequest {
            fields: Selection::All,
            many_to_many: Selection::None,
            reverse_relations: Selection::None,
            commit: false,
        }
    }
}

impl MergeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(mut self, fields: Selection) -> Self {
        self.fields = fields;
        self
    }

    pub fn many_to_many(mut self, relations: Selection) -> Self {
        self.many_to_many = relations;
        self
    }

    pub fn reverse_relations(mut self, relations: Selection) -> Self {
        self.reverse_relations = relations;
        self
    }

    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }
}
