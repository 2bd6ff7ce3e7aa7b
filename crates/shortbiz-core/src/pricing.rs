//! Plan catalogue.

use tracing::info;
use validator::Validate;

use crate::auth::require_admin;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{Plan, PlanChanges, PlanDraft, Store, User, is_unique_violation};

/// Plans open for checkout, cheapest first.
pub fn list_active_plans(store: &Store) -> ServiceResult<Vec<Plan>> {
    Ok(store.active_plans()?)
}

/// Add a plan. Admin only.
#[tracing::instrument(skip(store, admin, draft), fields(slug = %draft.slug))]
pub fn create_plan(store: &Store, admin: &User, draft: &PlanDraft) -> ServiceResult<Plan> {
    require_admin(admin)?;
    draft.validate()?;
    let plan = store.insert_plan(draft).map_err(|e| {
        if is_unique_violation(&e) {
            ServiceError::Conflict("Plan slug already exists.".into())
        } else {
            e.into()
        }
    })?;
    info!(plan_id = plan.id, "plan created");
    Ok(plan)
}

/// Change a plan. Admin only.
#[tracing::instrument(skip(store, admin, changes))]
pub fn update_plan(
    store: &Store,
    admin: &User,
    plan_id: i64,
    changes: &PlanChanges,
) -> ServiceResult<Plan> {
    require_admin(admin)?;
    changes.validate()?;
    store
        .update_plan(plan_id, changes)?
        .ok_or_else(|| ServiceError::not_found("Plan not found."))
}

/// Remove a plan. Admin only.
#[tracing::instrument(skip(store, admin))]
pub fn delete_plan(store: &Store, admin: &User, plan_id: i64) -> ServiceResult<()> {
    require_admin(admin)?;
    let removed = store.delete_plan(plan_id).map_err(|e| {
        if matches!(
            &e,
            crate::error::StoreError::Sqlite(rusqlite::Error::SqliteFailure(f, _))
                if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        ) {
            ServiceError::Conflict("Plan has subscriptions; deactivate it instead.".into())
        } else {
            e.into()
        }
    })?;
    if removed {
        info!("plan deleted");
        Ok(())
    } else {
        Err(ServiceError::not_found("Plan not found."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;

    fn users(store: &Store) -> (User, User) {
        let admin = store.insert_user("boss@example.com", "h", Role::Admin, 0).unwrap();
        let user = store.insert_user("a@example.com", "h", Role::User, 0).unwrap();
        (admin, user)
    }

    #[test]
    fn admin_manages_plans() {
        let store = Store::open_in_memory().unwrap();
        let (admin, _) = users(&store);

        let pro = create_plan(&store, &admin, &PlanDraft::new("Pro", "pro", 1900)).unwrap();
        assert_eq!(pro.currency, "USD");
        assert_eq!(pro.interval, "monthly");

        let dup = create_plan(&store, &admin, &PlanDraft::new("Pro again", "pro", 100));
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));

        let cheaper = update_plan(
            &store,
            &admin,
            pro.id,
            &PlanChanges {
                price_cents: Some(1500),
                ..PlanChanges::default()
            },
        )
        .unwrap();
        assert_eq!(cheaper.price_cents, 1500);
        assert_eq!(cheaper.name, "Pro");

        delete_plan(&store, &admin, pro.id).unwrap();
        assert!(matches!(
            delete_plan(&store, &admin, pro.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn non_admins_are_forbidden() {
        let store = Store::open_in_memory().unwrap();
        let (_, user) = users(&store);
        let err = create_plan(&store, &user, &PlanDraft::new("Pro", "pro", 1900)).unwrap_err();
        assert_eq!(err.status(), 403);
        assert!(update_plan(&store, &user, 1, &PlanChanges::default()).is_err());
        assert!(delete_plan(&store, &user, 1).is_err());
    }

    #[test]
    fn draft_validation() {
        let store = Store::open_in_memory().unwrap();
        let (admin, _) = users(&store);
        let negative = PlanDraft::new("Pro", "pro", -1);
        assert!(matches!(
            create_plan(&store, &admin, &negative),
            Err(ServiceError::Validation(_))
        ));
        let bad_currency = PlanDraft {
            currency: "DOLLARS".into(),
            ..PlanDraft::new("Pro", "pro", 100)
        };
        assert!(create_plan(&store, &admin, &bad_currency).is_err());
    }
}
