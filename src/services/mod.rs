pub mod folder_service;
pub mod ocr_service;
pub mod scan_service;
pub mod search_service;
