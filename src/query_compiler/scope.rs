use super::dialect::Tokens;

/// How column names of one participant are qualified.
///
/// A view, a sub-query or a derived table exposes every column under a single
/// alias. In physical mode repository columns live under `r<alias>` and type
/// columns under `<alias>`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableScope {
    pub alias: String,
    repo: Option<RepoSide>,
}

#[derive(Debug, Clone, PartialEq)]
struct RepoSide {
    alias: String,
    columns: Vec<String>,
}

impl TableScope {
    pub fn uniform(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            repo: None,
        }
    }

    pub fn physical(
        alias: impl Into<String>,
        repo_alias: impl Into<String>,
        repo_columns: Vec<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            repo: Some(RepoSide {
                alias: repo_alias.into(),
                columns: repo_columns,
            }),
        }
    }

    pub fn alias_for(&self, column: &str) -> &str {
        match &self.repo {
            Some(repo) if repo.columns.iter().any(|c| c == column) => &repo.alias,
            _ => &self.alias,
        }
    }

    pub fn column(&self, tokens: &Tokens, column: &str) -> String {
        tokens.qualified(self.alias_for(column), column)
    }
}
