/// Longest course or student name accepted.
pub const MAX_NAME_LEN: usize = 256;

/// Largest `max_size` a course may declare.
pub const MAX_COURSE_SIZE: u32 = 10_000;

/// Courses per tenant.
pub const MAX_COURSES_PER_TENANT: usize = 100_000;

/// Students per tenant.
pub const MAX_STUDENTS_PER_TENANT: usize = 1_000_000;

/// Loaded tenants per process.
pub const MAX_TENANTS: usize = 1_000;

/// Longest database name accepted as a tenant.
pub const MAX_TENANT_NAME_LEN: usize = 256;
