// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local record commands: `add`, `list`, `remove`.
//!
//! Every change goes through the ledger, so the record write and its upload
//! intent land in one transaction.

use chrono::{Local, Utc};

use mk_core::{
    EntityType, Expense, ExpenseCategory, Group, Meal, Member, Role, SyncableRecord,
};

use crate::cli::{AddCommand, CategoryArg, EntityArg, OutputFormat};
use crate::error::{Error, Result};
use crate::state::StateDir;

impl From<CategoryArg> for ExpenseCategory {
    fn from(category: CategoryArg) -> Self {
        match category {
            CategoryArg::Grocery => ExpenseCategory::Grocery,
            CategoryArg::Utility => ExpenseCategory::Utility,
            CategoryArg::Cooking => ExpenseCategory::Cooking,
            CategoryArg::Other => ExpenseCategory::Other,
        }
    }
}

/// Create a record and queue its upload.
pub fn add(state: &StateDir, record: AddCommand) -> Result<()> {
    let ledger = state.open_ledger()?;
    let today = Local::now().date_naive();

    let created = match record {
        AddCommand::Group { name, grocery_budget, cooking_charge } => {
            require("name", &name)?;
            ledger.create(&Group {
                name,
                grocery_budget_per_meal: grocery_budget,
                cooking_charge_per_meal: cooking_charge,
                created_at: Utc::now(),
            })?
        }
        AddCommand::Member { group, name, email, phone, admin } => {
            require("name", &name)?;
            if !email.contains('@') {
                return Err(Error::InvalidInput(format!("'{}' is not an email address", email)));
            }
            ledger.create(&Member {
                group_id: group,
                full_name: name,
                email,
                phone,
                role: if admin { Role::Admin } else { Role::Member },
                joined_at: Utc::now(),
            })?
        }
        AddCommand::Meal { group, member, date, breakfast, lunch, dinner } => {
            ledger.create(&Meal {
                group_id: group,
                member_id: member,
                date: date.unwrap_or(today),
                breakfast,
                lunch,
                dinner,
            })?
        }
        AddCommand::Expense { group, amount, title, by, category, description, date } => {
            require("title", &title)?;
            if !amount.is_finite() || amount <= 0.0 {
                return Err(Error::InvalidInput("amount must be positive".to_string()));
            }
            ledger.create(&Expense {
                group_id: group,
                added_by: by,
                category: category.into(),
                amount,
                title,
                description,
                expense_date: date.unwrap_or(today),
            })?
        }
    };

    println!("Added {} {}", created.entity_type, created.local_id);
    Ok(())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// List live local records of one kind.
pub fn list(
    state: &StateDir,
    kind: EntityArg,
    group: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    let ledger = state.open_ledger()?;
    let records = ledger.list(kind.into(), group)?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    for record in &records {
        println!("{}  {:<9} {}", record.local_id, record.sync_status.as_str(), summary(record));
    }
    Ok(())
}

fn summary(record: &SyncableRecord) -> String {
    let decoded = match record.entity_type {
        EntityType::Group => record.decode::<Group>().map(|g| g.name),
        EntityType::Member => {
            record.decode::<Member>().map(|m| format!("{} <{}>", m.full_name, m.email))
        }
        EntityType::Meal => record.decode::<Meal>().map(|m| {
            format!("{} {} ({}/{}/{})", m.member_id, m.date, m.breakfast, m.lunch, m.dinner)
        }),
        EntityType::Expense => record
            .decode::<Expense>()
            .map(|e| format!("{:.2} {} ({})", e.amount, e.title, e.expense_date)),
    };
    decoded.unwrap_or_else(|_| record.payload.to_string())
}

/// Delete a local record and queue the remote delete if it was uploaded.
pub fn remove(state: &StateDir, id: &str) -> Result<()> {
    let ledger = state.open_ledger()?;
    if ledger.delete(id)? {
        println!("Removed {}; remote delete queued", id);
    } else {
        println!("Removed {}", id);
    }
    Ok(())
}
