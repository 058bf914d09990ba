pub mod csv;
pub mod netcdf;
pub mod workbook;
