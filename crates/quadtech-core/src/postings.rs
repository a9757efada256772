//! # Ledger Posting Drafts
//!
//! Chart-of-account codes and the double-entry posting sets each business
//! workflow produces. The drafts are pure data; quadtech-db resolves the
//! account codes to ids and inserts the rows inside the workflow
//! transaction.
//!
//! ## Posting Pairs
//! ```text
//! ┌────────────────────┬───────────────────────────┬──────────────────────┐
//! │ Workflow           │ Debit                     │ Credit               │
//! ├────────────────────┼───────────────────────────┼──────────────────────┤
//! │ Sales order        │ 1001 Cash                 │ 4001 Sales Revenue   │
//! │   (per item w/cost)│ 5001 COGS                 │ 1002 Inventory       │
//! │ Stock in           │ 1002 Inventory            │ 2001 Accounts Payable│
//! │ Supplier payment   │ 2001 Accounts Payable     │ 1001 Cash            │
//! │ Expense            │ 5002..5007 category       │ 1001 Cash            │
//! │ Inventory write-off│ 5007 Other Expenses       │ 1002 Inventory       │
//! └────────────────────┴───────────────────────────┴──────────────────────┘
//! ```
//!
//! Invariant: every returned set is balanced (total debits == credits).

use crate::money::Money;
use crate::types::ExpenseCategory;

// =============================================================================
// Account Codes
// =============================================================================

/// Cash on hand (asset).
pub const ACCT_CASH: &str = "1001";
/// Inventory at cost (asset).
pub const ACCT_INVENTORY: &str = "1002";
/// Accounts payable (liability).
pub const ACCT_ACCOUNTS_PAYABLE: &str = "2001";
/// Sales revenue.
pub const ACCT_SALES_REVENUE: &str = "4001";
/// Cost of goods sold.
pub const ACCT_COGS: &str = "5001";
/// Rent expense.
pub const ACCT_RENT: &str = "5002";
/// Utilities expense.
pub const ACCT_UTILITIES: &str = "5003";
/// Salaries expense.
pub const ACCT_SALARIES: &str = "5004";
/// Supplies expense.
pub const ACCT_SUPPLIES: &str = "5005";
/// Marketing expense.
pub const ACCT_MARKETING: &str = "5006";
/// Catch-all expense account; also used for inventory write-offs.
pub const ACCT_OTHER_EXPENSES: &str = "5007";

/// Maps an expense category to its chart-of-accounts code.
pub fn expense_account_code(category: ExpenseCategory) -> &'static str {
    match category {
        ExpenseCategory::Rent => ACCT_RENT,
        ExpenseCategory::Utilities => ACCT_UTILITIES,
        ExpenseCategory::Salaries => ACCT_SALARIES,
        ExpenseCategory::Supplies => ACCT_SUPPLIES,
        ExpenseCategory::Marketing => ACCT_MARKETING,
        ExpenseCategory::Other => ACCT_OTHER_EXPENSES,
    }
}

// =============================================================================
// Posting Draft
// =============================================================================

/// A single ledger line before account-code resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingDraft {
    pub account_code: &'static str,
    pub debit: Money,
    pub credit: Money,
    pub description: String,
}

impl PostingDraft {
    fn debit(account_code: &'static str, amount: Money, description: String) -> Self {
        PostingDraft {
            account_code,
            debit: amount,
            credit: Money::zero(),
            description,
        }
    }

    fn credit(account_code: &'static str, amount: Money, description: String) -> Self {
        PostingDraft {
            account_code,
            debit: Money::zero(),
            credit: amount,
            description,
        }
    }
}

/// Checks the debit = credit invariant over a posting set.
pub fn is_balanced(postings: &[PostingDraft]) -> bool {
    let debits: Money = postings.iter().map(|p| p.debit).sum();
    let credits: Money = postings.iter().map(|p| p.credit).sum();
    debits == credits
}

// =============================================================================
// Workflow Builders
// =============================================================================

/// Cost line of a sold item, for COGS postings.
#[derive(Debug, Clone)]
pub struct SoldItemCost {
    pub product_name: String,
    /// cost price × quantity; None when the product has no recorded cost.
    pub cost: Option<Money>,
}

/// Postings for a completed sale: cash against revenue, plus COGS against
/// inventory for every item with a known cost.
pub fn sale_postings(
    order_number: &str,
    total: Money,
    item_costs: &[SoldItemCost],
) -> Vec<PostingDraft> {
    let mut postings = vec![
        PostingDraft::debit(ACCT_CASH, total, format!("Sale {order_number}")),
        PostingDraft::credit(ACCT_SALES_REVENUE, total, format!("Sale {order_number}")),
    ];

    for item in item_costs {
        if let Some(cost) = item.cost {
            if cost.is_zero() {
                continue;
            }
            postings.push(PostingDraft::debit(
                ACCT_COGS,
                cost,
                format!("COGS for sale {order_number} - {}", item.product_name),
            ));
            postings.push(PostingDraft::credit(
                ACCT_INVENTORY,
                cost,
                format!("Inventory sold - sale {order_number} - {}", item.product_name),
            ));
        }
    }

    postings
}

/// Postings for a goods receipt: inventory up, accounts payable up.
pub fn stock_in_postings(receipt_number: &str, total_cost: Money) -> Vec<PostingDraft> {
    vec![
        PostingDraft::debit(
            ACCT_INVENTORY,
            total_cost,
            format!("Stock in {receipt_number}"),
        ),
        PostingDraft::credit(
            ACCT_ACCOUNTS_PAYABLE,
            total_cost,
            format!("Stock in {receipt_number}"),
        ),
    ]
}

/// Postings for a supplier payment: payable down, cash down. The pair is
/// emitted whether or not the payment is applied to a tracked AP balance;
/// only the narration changes.
pub fn payment_postings(payment_id: i64, amount: Money, applied_to_ap: bool) -> Vec<PostingDraft> {
    let description = if applied_to_ap {
        format!("Payment to supplier - payment #{payment_id}")
    } else {
        format!("Payment - payment #{payment_id}")
    };

    vec![
        PostingDraft::debit(ACCT_ACCOUNTS_PAYABLE, amount, description.clone()),
        PostingDraft::credit(ACCT_CASH, amount, description),
    ]
}

/// Postings for an operating expense: category expense against cash.
pub fn expense_postings(
    category: ExpenseCategory,
    description: &str,
    amount: Money,
) -> Vec<PostingDraft> {
    let text = format!("{category}: {description}");
    vec![
        PostingDraft::debit(expense_account_code(category), amount, text.clone()),
        PostingDraft::credit(ACCT_CASH, amount, text),
    ]
}

/// Postings for an inventory write-off (damaged/missing/disposal issues).
pub fn write_off_postings(issue_number: &str, reason: &str, cost: Money) -> Vec<PostingDraft> {
    let text = format!("Inventory write-off ({reason}) - {issue_number}");
    vec![
        PostingDraft::debit(ACCT_OTHER_EXPENSES, cost, text.clone()),
        PostingDraft::credit(ACCT_INVENTORY, cost, text),
    ]
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_account_mapping() {
        assert_eq!(expense_account_code(ExpenseCategory::Rent), "5002");
        assert_eq!(expense_account_code(ExpenseCategory::Marketing), "5006");
        assert_eq!(expense_account_code(ExpenseCategory::Other), "5007");
    }

    #[test]
    fn test_sale_postings_balanced() {
        let costs = vec![
            SoldItemCost {
                product_name: "Quad X1 Frame".into(),
                cost: Some(Money::from_cents(4_000)),
            },
            SoldItemCost {
                product_name: "Prop Set".into(),
                cost: None, // no recorded cost, no COGS pair
            },
        ];
        let postings = sale_postings("INV-202601-0001", Money::from_cents(9_900), &costs);

        // cash/revenue + one COGS/inventory pair
        assert_eq!(postings.len(), 4);
        assert!(is_balanced(&postings));
        assert_eq!(postings[0].account_code, ACCT_CASH);
        assert_eq!(postings[0].debit.cents(), 9_900);
        assert_eq!(postings[2].account_code, ACCT_COGS);
        assert_eq!(postings[2].debit.cents(), 4_000);
    }

    #[test]
    fn test_sale_postings_skip_zero_cost() {
        let costs = vec![SoldItemCost {
            product_name: "Sticker".into(),
            cost: Some(Money::zero()),
        }];
        let postings = sale_postings("INV-202601-0002", Money::from_cents(100), &costs);
        assert_eq!(postings.len(), 2);
        assert!(is_balanced(&postings));
    }

    #[test]
    fn test_stock_in_postings() {
        let postings = stock_in_postings("SI-001", Money::from_cents(50_000));
        assert_eq!(postings.len(), 2);
        assert!(is_balanced(&postings));
        assert_eq!(postings[0].account_code, ACCT_INVENTORY);
        assert_eq!(postings[1].account_code, ACCT_ACCOUNTS_PAYABLE);
    }

    #[test]
    fn test_payment_postings() {
        let postings = payment_postings(7, Money::from_cents(2_500), true);
        assert!(is_balanced(&postings));
        assert!(postings[0].description.contains("supplier"));

        let unapplied = payment_postings(8, Money::from_cents(100), false);
        assert!(!unapplied[0].description.contains("supplier"));
    }

    #[test]
    fn test_expense_postings() {
        let postings = expense_postings(
            ExpenseCategory::Utilities,
            "January electricity",
            Money::from_cents(12_000),
        );
        assert!(is_balanced(&postings));
        assert_eq!(postings[0].account_code, ACCT_UTILITIES);
        assert_eq!(postings[1].account_code, ACCT_CASH);
        assert!(postings[0].description.contains("January electricity"));
    }

    #[test]
    fn test_write_off_postings() {
        let postings = write_off_postings("STO-003", "damaged", Money::from_cents(3_000));
        assert!(is_balanced(&postings));
        assert_eq!(postings[0].account_code, ACCT_OTHER_EXPENSES);
        assert_eq!(postings[1].account_code, ACCT_INVENTORY);
    }
}
