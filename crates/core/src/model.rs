// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Business entities of the shared meal and expense ledger.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType};

/// A household sharing meals and expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub grocery_budget_per_meal: f64,
    #[serde(default)]
    pub cooking_charge_per_meal: f64,
    pub created_at: DateTime<Utc>,
}

impl Entity for Group {
    const ENTITY_TYPE: EntityType = EntityType::Group;

    fn group_id(&self) -> Option<&str> {
        None
    }
}

/// Role of a member inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

/// A person in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub group_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl Entity for Member {
    const ENTITY_TYPE: EntityType = EntityType::Member;

    fn group_id(&self) -> Option<&str> {
        Some(&self.group_id)
    }

    fn natural_key(&self) -> Option<String> {
        Some(self.email.trim().to_lowercase())
    }
}

/// Meal counts for one member on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meal {
    pub group_id: String,
    pub member_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub breakfast: u32,
    #[serde(default)]
    pub lunch: u32,
    #[serde(default)]
    pub dinner: u32,
}

impl Meal {
    pub fn total(&self) -> u32 {
        self.breakfast + self.lunch + self.dinner
    }
}

impl Entity for Meal {
    const ENTITY_TYPE: EntityType = EntityType::Meal;

    fn group_id(&self) -> Option<&str> {
        Some(&self.group_id)
    }

    fn natural_key(&self) -> Option<String> {
        Some(format!("{}/{}", self.member_id, self.date))
    }
}

/// Spending category of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    #[default]
    Grocery,
    Utility,
    Cooking,
    Other,
}

/// Money spent on behalf of the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub group_id: String,
    pub added_by: String,
    #[serde(default)]
    pub category: ExpenseCategory,
    pub amount: f64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub expense_date: NaiveDate,
}

impl Entity for Expense {
    const ENTITY_TYPE: EntityType = EntityType::Expense;

    fn group_id(&self) -> Option<&str> {
        Some(&self.group_id)
    }
}
