//! Collections of the `investing_agent` database

use super::{CollectionSpec, FieldSpec, IndexSpec, SortOrder};

/// Database the catalog is provisioned into by default
pub const DATABASE_NAME: &str = "investing_agent";

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Collection name for investment plans
pub const INVESTMENT_PLAN_COLLECTION: &str = "investment_plans";

/// Collection name for individual investments
pub const INVESTMENT_COLLECTION: &str = "investments";

/// Loose email shape; full RFC 5322 is left to the application
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Accepted values for `users.investment_profile`
pub const INVESTMENT_PROFILES: [&str; 3] = ["conservative", "moderate", "aggressive"];

/// All collections, in provisioning order
pub fn investing_agent() -> Vec<CollectionSpec> {
    vec![users(), investment_plans(), investments()]
}

pub fn users() -> CollectionSpec {
    CollectionSpec {
        name: USER_COLLECTION,
        required: vec!["email", "created_at"],
        fields: vec![
            FieldSpec::string("email").pattern(EMAIL_PATTERN),
            FieldSpec::string("country"),
            FieldSpec::string("investment_profile").one_of(&INVESTMENT_PROFILES),
            FieldSpec::int("age").range(18, 100),
            FieldSpec::date("created_at"),
            FieldSpec::date("updated_at"),
        ],
        indexes: vec![
            IndexSpec::ascending("email").unique(),
            IndexSpec::ascending("country"),
            IndexSpec::ascending("investment_profile"),
        ],
    }
}

pub fn investment_plans() -> CollectionSpec {
    let by_user_newest_first =
        IndexSpec::compound(&[("user_id", SortOrder::Ascending), ("created_at", SortOrder::Descending)]);

    CollectionSpec {
        name: INVESTMENT_PLAN_COLLECTION,
        required: vec!["user_id", "user_context", "message", "investments", "created_at"],
        fields: vec![
            FieldSpec::string("user_id"),
            FieldSpec::object("user_context"),
            FieldSpec::string("message"),
            FieldSpec::array("likes"),
            FieldSpec::array("investments"),
            FieldSpec::array("explained_investments"),
            FieldSpec::date("created_at"),
            FieldSpec::date("updated_at"),
        ],
        // The compound index is declared twice in the deployed init script;
        // the planner collapses the repeat.
        indexes: vec![
            IndexSpec::ascending("user_id"),
            IndexSpec::descending("created_at"),
            by_user_newest_first.clone(),
            by_user_newest_first,
        ],
    }
}

pub fn investments() -> CollectionSpec {
    CollectionSpec {
        name: INVESTMENT_COLLECTION,
        required: vec!["name", "amount", "percentage", "reason", "risk", "ease_of_use"],
        fields: vec![
            FieldSpec::string("name"),
            FieldSpec::number("amount").minimum(0),
            FieldSpec::number("percentage").range(0, 100),
            FieldSpec::string("reason"),
            FieldSpec::int("risk").range(1, 10),
            FieldSpec::int("ease_of_use").range(1, 10),
            FieldSpec::string("explanation"),
            FieldSpec::date("created_at"),
            FieldSpec::date("updated_at"),
        ],
        indexes: vec![
            IndexSpec::ascending("risk"),
            IndexSpec::ascending("ease_of_use"),
            IndexSpec::descending("created_at"),
        ],
    }
}

/// Look up a collection spec by name
pub fn find<'a>(catalog: &'a [CollectionSpec], name: &str) -> Option<&'a CollectionSpec> {
    catalog.iter().find(|c| c.name == name)
}
