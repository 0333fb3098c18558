//! Deterministic person-name generation for patients and staff.
//!
//! Same RNG stream = same names; nothing here touches a platform RNG.

use crate::config::StaffRole;
use crate::rng::StageRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
        }
    }
}

pub struct NameGenerator;

impl NameGenerator {
    /// Draw a gender and a matching first name plus a surname.
    pub fn person(rng: &mut StageRng) -> (Gender, String) {
        let gender = if rng.chance(0.52) { Gender::Female } else { Gender::Male };
        let first = match gender {
            Gender::Female => *rng.pick(FEMALE_FIRST),
            Gender::Male => *rng.pick(MALE_FIRST),
        };
        let last = *rng.pick(SURNAMES);
        (gender, format!("{first} {last}"))
    }

    /// A staff display name carrying the role's usual title or credential.
    pub fn staff_name(role: StaffRole, rng: &mut StageRng) -> String {
        let (_, name) = Self::person(rng);
        match role {
            StaffRole::Dentist => format!("Dr. {name}"),
            StaffRole::Hygienist => format!("{name}, RDH"),
            StaffRole::Assistant => format!("{name}, CDA"),
            StaffRole::Admin => name,
        }
    }
}

const FEMALE_FIRST: &[&str] = &[
    "Olivia", "Emma", "Ava", "Sophia", "Isabella", "Mia", "Amelia", "Harper", "Evelyn",
    "Abigail", "Emily", "Ella", "Elizabeth", "Camila", "Luna", "Sofia", "Avery", "Mila",
    "Aria", "Scarlett", "Penelope", "Layla", "Chloe", "Victoria", "Madison", "Eleanor",
    "Grace", "Nora", "Riley", "Zoey", "Hannah", "Hazel", "Lily", "Ellie", "Violet",
    "Lillian", "Zoe", "Stella", "Aurora", "Natalie", "Emilia", "Everly", "Leah", "Aubrey",
    "Willow", "Addison", "Lucy", "Audrey", "Bella", "Nova", "Brooklyn", "Paisley", "Savannah",
    "Claire", "Skylar", "Isla", "Genesis", "Naomi", "Elena", "Caroline", "Eliana", "Anna",
    "Maya", "Valentina", "Ruby", "Kennedy", "Ivy", "Ariana", "Aaliyah", "Cora", "Madelyn",
    "Alice", "Kinsley", "Hailey", "Gabriella", "Allison", "Gianna", "Serenity", "Samantha",
    "Sarah", "Priya", "Mei", "Fatima", "Keiko", "Ananya", "Lucia", "Ingrid", "Amara",
];

const MALE_FIRST: &[&str] = &[
    "Liam", "Noah", "Oliver", "Elijah", "James", "William", "Benjamin", "Lucas", "Henry",
    "Theodore", "Jack", "Levi", "Alexander", "Jackson", "Mateo", "Daniel", "Michael",
    "Mason", "Sebastian", "Ethan", "Logan", "Owen", "Samuel", "Jacob", "Asher", "Aiden",
    "John", "Joseph", "Wyatt", "David", "Leo", "Luke", "Julian", "Hudson", "Grayson",
    "Matthew", "Ezra", "Gabriel", "Carter", "Isaac", "Jayden", "Luca", "Anthony", "Dylan",
    "Lincoln", "Thomas", "Maverick", "Elias", "Josiah", "Charles", "Caleb", "Christopher",
    "Ezekiel", "Miles", "Jaxon", "Isaiah", "Andrew", "Joshua", "Nathan", "Nolan", "Adrian",
    "Cameron", "Santiago", "Eli", "Aaron", "Ryan", "Angel", "Cooper", "Waylon", "Easton",
    "Kai", "Christian", "Landon", "Colton", "Roman", "Axel", "Brooks", "Jonathan", "Robert",
    "Jameson", "Arjun", "Wei", "Omar", "Hiro", "Rohan", "Diego", "Tomas", "Kwame",
];

const SURNAMES: &[&str] = &[
    "Anderson", "Bennett", "Brooks", "Campbell", "Carter", "Chen", "Collins", "Cooper",
    "Diaz", "Edwards", "Evans", "Fischer", "Flores", "Foster", "Garcia", "Gonzalez", "Gray",
    "Green", "Hall", "Harris", "Hayes", "Hernandez", "Hill", "Howard", "Hughes", "Ito",
    "Jackson", "James", "Jenkins", "Johnson", "Kelly", "Khan", "Kim", "King", "Kowalski",
    "Lee", "Lewis", "Lopez", "Martin", "Martinez", "Mitchell", "Moore", "Morgan", "Morris",
    "Murphy", "Nakamura", "Nelson", "Nguyen", "O'Brien", "Okafor", "Ortiz", "Parker",
    "Patel", "Perez", "Peterson", "Phillips", "Price", "Ramirez", "Reed", "Reyes",
    "Richardson", "Rivera", "Roberts", "Robinson", "Rodriguez", "Rogers", "Ross", "Russell",
    "Sanchez", "Sanders", "Schmidt", "Scott", "Shah", "Silva", "Singh", "Smith", "Stewart",
    "Sullivan", "Taylor", "Thomas", "Thompson", "Torres", "Turner", "Walker", "Ward",
    "Watson", "White", "Williams", "Wilson", "Wood", "Wright", "Young", "Zhang",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, StageSlot};

    #[test]
    fn name_generation_is_deterministic() {
        let mut rng1 = RngBank::new(12345).for_stage(StageSlot::Population);
        let mut rng2 = RngBank::new(12345).for_stage(StageSlot::Population);
        for _ in 0..20 {
            assert_eq!(NameGenerator::person(&mut rng1), NameGenerator::person(&mut rng2));
        }
    }

    #[test]
    fn staff_names_carry_role_titles() {
        let mut rng = RngBank::new(9).for_stage(StageSlot::Operations);
        assert!(NameGenerator::staff_name(StaffRole::Dentist, &mut rng).starts_with("Dr. "));
        assert!(NameGenerator::staff_name(StaffRole::Hygienist, &mut rng).ends_with(", RDH"));
        let admin = NameGenerator::staff_name(StaffRole::Admin, &mut rng);
        assert_eq!(admin.split_whitespace().count(), 2, "admin name: {admin}");
    }
}
