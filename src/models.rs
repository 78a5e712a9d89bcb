pub mod branch;
pub mod meal_plan;
