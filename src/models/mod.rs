pub mod description;
pub mod directory;
pub mod helpdesk;
pub mod odoo;
pub mod ticket;
