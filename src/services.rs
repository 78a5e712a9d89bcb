pub mod branch_service;
pub use branch_service::BranchService;

pub mod meal_plan_service;
pub use meal_plan_service::MealPlanService;
