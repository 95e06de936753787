//! Row types flowing through the pipeline
//!
//! `RawDataset` (extract) -> `Vec<NewEmployee>` (transform) ->
//! `Vec<Employee>` (allocate) -> `employees` table (load).

use sqlx::types::BigDecimal;

// Header names of the source file. The input is produced upstream in Spanish
// and these literals are its wire format.
pub const COL_SALARY: &str = "salario";
pub const COL_FIRST_NAME: &str = "nombre";
pub const COL_LAST_NAME: &str = "apellido";
pub const COL_HIRE_DATE: &str = "fecha_contratacion";
pub const COL_DEPARTMENT_ID: &str = "id_departamento";

pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_SALARY,
    COL_FIRST_NAME,
    COL_LAST_NAME,
    COL_HIRE_DATE,
    COL_DEPARTMENT_ID,
];

/// One data row of the source file. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the source file
    pub line: u64,
    pub values: Vec<Option<String>>,
}

impl RawRow {
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }
}

/// The whole source file, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDataset {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a header, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// A cleaned row that has not been given an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    /// Passed to the database as text and cast to DATE there
    pub hire_date: String,
    /// Scale 2
    pub salary: BigDecimal,
    pub department_id: i32,
    /// Source line, for error reports
    pub source_line: u64,
}

impl NewEmployee {
    pub fn with_id(self, employee_id: i32) -> Employee {
        Employee {
            employee_id,
            first_name: self.first_name,
            last_name: self.last_name,
            hire_date: self.hire_date,
            salary: self.salary,
            department_id: self.department_id,
            source_line: self.source_line,
        }
    }
}

/// A row ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub employee_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub hire_date: String,
    pub salary: BigDecimal,
    pub department_id: i32,
    pub source_line: u64,
}
